use std::sync::Arc;
use std::time::Instant;

use crate::contracts::{AllocationError, CounterStore, SequenceAllocator};
use crate::metrics::AllocationMetrics;

/// Longest accepted counter key, in bytes.
pub const MAX_KEY_LEN: usize = 128;

/// Sequence allocator backed by a [`CounterStore`].
///
/// Holds no counter state of its own: every call is a single
/// `increment_or_create` against the store, so any number of allocators
/// sharing one store hand out a dense, duplicate-free sequence per key.
pub struct CounterAllocator<S: CounterStore> {
    store: Arc<S>,
    metrics: Option<Arc<AllocationMetrics>>,
}

impl<S: CounterStore> CounterAllocator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            metrics: None,
        }
    }

    /// Records allocation counts and latencies into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<AllocationMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl<S: CounterStore> Clone for CounterAllocator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            metrics: self.metrics.clone(),
        }
    }
}

impl<S: CounterStore> SequenceAllocator for CounterAllocator<S> {
    fn next_sequence(&self, key: &str) -> Result<u64, AllocationError> {
        if let Err(e) = validate_key(key) {
            if let Some(metrics) = &self.metrics {
                metrics.record_invalid_key();
            }
            return Err(e);
        }

        let start = Instant::now();
        match self.store.increment_or_create(key) {
            Ok(seq) => {
                let latency_us = start.elapsed().as_micros() as u64;
                if let Some(metrics) = &self.metrics {
                    metrics.record_allocation(key, seq, latency_us);
                }
                tracing::debug!(key = %key, seq, latency_us, "Allocated sequence");
                Ok(seq)
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_error();
                }
                tracing::warn!(key = %key, error = %e, "Sequence allocation failed");
                Err(AllocationError::Storage(e))
            }
        }
    }
}

/// Checks that a counter key is 1..=128 bytes of ASCII letters, digits,
/// `-`, `_` or `.`.
pub fn validate_key(key: &str) -> Result<(), AllocationError> {
    let invalid = |reason: &str| AllocationError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("key must not be empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(invalid(&format!(
            "key must be at most {} bytes",
            MAX_KEY_LEN
        )));
    }
    if let Some(c) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(invalid(&format!("unsupported character {:?}", c)));
    }
    Ok(())
}
