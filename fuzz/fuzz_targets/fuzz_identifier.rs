#![no_main]

use libfuzzer_sys::fuzz_target;
use tally::sequence::{format_identifier, IssuedIdentifier};

fuzz_target!(|data: &[u8]| {
    // Anything that parses must format back to the same string
    let input = String::from_utf8_lossy(data);
    if let Ok(id) = input.parse::<IssuedIdentifier>() {
        assert_eq!(format_identifier(id.year, id.sequence), input);
    }
});
