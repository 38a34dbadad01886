#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use tally::contracts::{CounterStore, SequenceAllocator};
use tally::sequence::{validate_key, CounterAllocator};
use tally::storage::InMemoryStorage;

fuzz_target!(|data: &[u8]| {
    // Invalid UTF-8 becomes replacement chars, which the key grammar rejects
    let key = String::from_utf8_lossy(data);
    let storage = Arc::new(InMemoryStorage::new());
    let allocator = CounterAllocator::new(Arc::clone(&storage));

    match allocator.next_sequence(&key) {
        Ok(seq) => {
            assert!(validate_key(&key).is_ok());
            assert_eq!(seq, 1);
            assert_eq!(allocator.next_sequence(&key).unwrap(), 2);
        }
        Err(_) => {
            // Rejected keys never touch the store
            assert!(storage.list_counters().unwrap().is_empty());
        }
    }
});
