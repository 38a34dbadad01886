use std::sync::{MutexGuard, PoisonError, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

/// Extension trait for converting lock errors to StorageError.
pub trait LockResultExt<T> {
    /// Converts a lock error to a StorageError.
    fn map_lock_err(self) -> Result<T, StorageError>;
}

impl<'a, T> LockResultExt<MutexGuard<'a, T>>
    for Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>
{
    #[inline]
    fn map_lock_err(self) -> Result<MutexGuard<'a, T>, StorageError> {
        self.map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }
}

impl<'a, T> LockResultExt<RwLockReadGuard<'a, T>>
    for Result<RwLockReadGuard<'a, T>, PoisonError<RwLockReadGuard<'a, T>>>
{
    #[inline]
    fn map_lock_err(self) -> Result<RwLockReadGuard<'a, T>, StorageError> {
        self.map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }
}

impl<'a, T> LockResultExt<RwLockWriteGuard<'a, T>>
    for Result<RwLockWriteGuard<'a, T>, PoisonError<RwLockWriteGuard<'a, T>>>
{
    #[inline]
    fn map_lock_err(self) -> Result<RwLockWriteGuard<'a, T>, StorageError> {
        self.map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }
}

/// Failures of the persistence layer. Any of these means the store could not
/// confirm the operation committed.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("RocksDB error: {0}")]
    RocksDb(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Counter overflow for key: {0}")]
    CounterOverflow(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("Invalid counter key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum IssuanceError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Certificate not found: {0}")]
    NotFound(String),

    #[error("Failed to allocate certificate number: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn poisoned_mutex_maps_to_storage_error() {
        let lock = Arc::new(Mutex::new(0u64));
        let poisoner = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let err = lock.lock().map_lock_err().unwrap_err();
        assert!(matches!(err, StorageError::LockPoisoned(_)));
    }

    #[test]
    fn allocation_error_is_transparent_over_storage() {
        let err = AllocationError::from(StorageError::Unavailable("disk gone".into()));
        assert_eq!(err.to_string(), "Storage unavailable: disk gone");
    }
}
