use serde::{Deserialize, Serialize};

use crate::contracts::error::StorageError;

/// A named counter as persisted by a [`CounterStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub key: String,
    /// Last value handed out for this key.
    pub seq: u64,
}

/// Persisted key -> integer state backing the sequence allocator.
///
/// # Invariants
/// - `increment_or_create` is a single indivisible operation per key: two
///   concurrent calls never return the same value
/// - The returned value is durable before the call returns
/// - A counter is created lazily at 1 and never decreases
pub trait CounterStore: Send + Sync {
    /// Atomically creates the counter at 1, or increments it by 1.
    /// Returns the resulting value.
    fn increment_or_create(&self, key: &str) -> Result<u64, StorageError>;

    /// Returns the last issued value for a key, if the counter exists.
    ///
    /// Diagnostic only. The value is stale as soon as another caller
    /// allocates, so it must never be used to predict the next value.
    fn current(&self, key: &str) -> Result<Option<u64>, StorageError>;

    /// Lists every counter, ordered by key.
    fn list_counters(&self) -> Result<Vec<Counter>, StorageError>;
}
