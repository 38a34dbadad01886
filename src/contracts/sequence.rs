use crate::contracts::error::AllocationError;

/// Hands out unique, strictly increasing numbers per named counter.
///
/// # Invariants
/// - Each call for a key returns a value greater than any previous call for it
/// - N calls on a fresh key return exactly `{1, ..., N}` in some order
/// - A failed call never yields a number; a retry allocates a fresh one
pub trait SequenceAllocator: Send + Sync {
    /// Returns the next sequence number for `key`.
    fn next_sequence(&self, key: &str) -> Result<u64, AllocationError>;
}
