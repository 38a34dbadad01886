use std::collections::BTreeMap;
use std::sync::RwLock;

use dashmap::DashMap;

use crate::contracts::{
    Certificate, CertificateStore, Counter, CounterStore, LockResultExt, StorageError,
};

/// Volatile storage for tests and embedding.
///
/// Counter updates go through the `DashMap` entry API, which holds the
/// shard write lock for the whole read-increment-write, so concurrent
/// callers on one key are serialized.
#[derive(Default)]
pub struct InMemoryStorage {
    counters: DashMap<String, u64>,
    certificates: RwLock<BTreeMap<u64, Certificate>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for InMemoryStorage {
    fn increment_or_create(&self, key: &str) -> Result<u64, StorageError> {
        let mut seq = self.counters.entry(key.to_string()).or_insert(0);
        let next = seq
            .checked_add(1)
            .ok_or_else(|| StorageError::CounterOverflow(key.to_string()))?;
        *seq = next;
        Ok(next)
    }

    fn current(&self, key: &str) -> Result<Option<u64>, StorageError> {
        Ok(self.counters.get(key).map(|seq| *seq))
    }

    fn list_counters(&self) -> Result<Vec<Counter>, StorageError> {
        let mut counters: Vec<Counter> = self
            .counters
            .iter()
            .map(|entry| Counter {
                key: entry.key().clone(),
                seq: *entry.value(),
            })
            .collect();
        counters.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(counters)
    }
}

impl CertificateStore for InMemoryStorage {
    fn insert_certificate(&self, certificate: &Certificate) -> Result<(), StorageError> {
        let mut certificates = self.certificates.write().map_lock_err()?;
        if certificates.contains_key(&certificate.sequence_number) {
            return Err(StorageError::Duplicate(certificate.certificate_id.clone()));
        }
        certificates.insert(certificate.sequence_number, certificate.clone());
        Ok(())
    }

    fn get_certificate(&self, sequence_number: u64) -> Result<Option<Certificate>, StorageError> {
        let certificates = self.certificates.read().map_lock_err()?;
        Ok(certificates.get(&sequence_number).cloned())
    }

    fn list_certificates(&self) -> Result<Vec<Certificate>, StorageError> {
        let certificates = self.certificates.read().map_lock_err()?;
        Ok(certificates.values().rev().cloned().collect())
    }
}
