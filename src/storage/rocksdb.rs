use std::path::Path;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use rocksdb::{Direction, IteratorMode, Options, ReadOptions, WriteOptions, DB};

use crate::contracts::{
    Certificate, CertificateStore, Counter, CounterStore, LockResultExt, StorageError,
};

/// Key prefix for named counters
const COUNTER_PREFIX: &str = "ctr";
/// Key prefix for certificate records
const CERTIFICATE_PREFIX: &str = "cert";

/// Kind of record being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Counter,
    Certificate,
}

/// RocksDB-backed storage for counters and certificates.
///
/// RocksDB holds an exclusive lock on its directory, so this process is the
/// only writer. Within the process, each counter key has its own mutex held
/// across the read, the increment and the synced write.
pub struct RocksDbStorage {
    db: DB,
    /// Per-key allocation locks
    counter_locks: DashMap<String, Arc<Mutex<()>>>,
    /// Serializes certificate inserts so the duplicate check and put are atomic
    certificate_lock: Mutex<()>,
    /// fsync certificate writes before acknowledging them
    sync_writes: bool,
}

impl RocksDbStorage {
    /// Opens or creates storage at the given path with synced writes.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_sync(path, true)
    }

    /// Opens or creates storage, choosing whether certificate writes are
    /// fsynced.
    ///
    /// Counter writes are always fsynced. With `sync_writes = false` a
    /// certificate write survives a process crash (it is in the WAL) but not
    /// an OS crash.
    pub fn open_with_sync(path: impl AsRef<Path>, sync_writes: bool) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        // Counters and certificates are tiny; keep memtables small
        opts.set_write_buffer_size(8 * 1024 * 1024);
        opts.set_max_write_buffer_number(2);

        let db = DB::open(&opts, path).map_err(|e| StorageError::RocksDb(e.to_string()))?;

        tracing::info!(path = %path.display(), sync_writes, "Opened RocksDB storage");

        Ok(Self {
            db,
            counter_locks: DashMap::new(),
            certificate_lock: Mutex::new(()),
            sync_writes,
        })
    }

    /// Returns true if writes of this kind are fsynced before returning.
    pub fn syncs(&self, kind: WriteKind) -> bool {
        match kind {
            WriteKind::Counter => true,
            WriteKind::Certificate => self.sync_writes,
        }
    }

    /// Creates a counter key: ctr:{key}
    fn counter_key(key: &str) -> String {
        format!("{}:{}", COUNTER_PREFIX, key)
    }

    /// Creates a certificate key: cert:{sequence_hex}
    /// Hex keeps lexicographic order equal to numeric order.
    fn certificate_key(sequence_number: u64) -> String {
        format!("{}:{:016x}", CERTIFICATE_PREFIX, sequence_number)
    }

    /// Gets or creates the allocation lock for a counter key.
    fn counter_lock(&self, key: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.counter_locks.get(key) {
            return Arc::clone(lock.value());
        }
        Arc::clone(
            self.counter_locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    fn write_options(&self, kind: WriteKind) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.syncs(kind));
        opts
    }

    /// Read options bounded to keys starting with `prefix:`.
    fn prefix_read_options(prefix: &str) -> ReadOptions {
        let mut opts = ReadOptions::default();
        // ';' is the byte after ':'
        opts.set_iterate_upper_bound(format!("{};", prefix).into_bytes());
        opts
    }

    /// Parses a u64 from big-endian bytes.
    #[inline]
    fn parse_u64_be(bytes: &[u8]) -> Result<u64, StorageError> {
        bytes
            .try_into()
            .map(u64::from_be_bytes)
            .map_err(|_| StorageError::Serialization("Invalid u64 bytes".into()))
    }

    /// Gets a u64 value from the database by key.
    #[inline]
    fn get_u64(&self, key: &str) -> Result<Option<u64>, StorageError> {
        match self.db.get(key.as_bytes()) {
            Ok(Some(bytes)) => Ok(Some(Self::parse_u64_be(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::RocksDb(e.to_string())),
        }
    }

    fn serialize_certificate(certificate: &Certificate) -> Result<Vec<u8>, StorageError> {
        bincode::serialize(certificate).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn deserialize_certificate(bytes: &[u8]) -> Result<Certificate, StorageError> {
        bincode::deserialize(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

impl CounterStore for RocksDbStorage {
    fn increment_or_create(&self, key: &str) -> Result<u64, StorageError> {
        let lock = self.counter_lock(key);
        let _guard = lock.lock().map_lock_err()?;

        let db_key = Self::counter_key(key);
        let next = match self.get_u64(&db_key)? {
            Some(current) => current
                .checked_add(1)
                .ok_or_else(|| StorageError::CounterOverflow(key.to_string()))?,
            None => 1,
        };

        self.db
            .put_opt(
                db_key.as_bytes(),
                next.to_be_bytes(),
                &self.write_options(WriteKind::Counter),
            )
            .map_err(|e| StorageError::RocksDb(e.to_string()))?;

        Ok(next)
    }

    fn current(&self, key: &str) -> Result<Option<u64>, StorageError> {
        self.get_u64(&Self::counter_key(key))
    }

    fn list_counters(&self) -> Result<Vec<Counter>, StorageError> {
        let prefix = format!("{}:", COUNTER_PREFIX);
        let iter = self.db.iterator_opt(
            IteratorMode::From(prefix.as_bytes(), Direction::Forward),
            Self::prefix_read_options(COUNTER_PREFIX),
        );

        let mut counters = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StorageError::RocksDb(e.to_string()))?;
            let key = std::str::from_utf8(&key)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            let Some(name) = key.strip_prefix(prefix.as_str()) else {
                continue;
            };
            counters.push(Counter {
                key: name.to_string(),
                seq: Self::parse_u64_be(&value)?,
            });
        }
        Ok(counters)
    }
}

impl CertificateStore for RocksDbStorage {
    fn insert_certificate(&self, certificate: &Certificate) -> Result<(), StorageError> {
        let key = Self::certificate_key(certificate.sequence_number);
        let bytes = Self::serialize_certificate(certificate)?;

        let _guard = self.certificate_lock.lock().map_lock_err()?;
        let exists = self
            .db
            .get_pinned(key.as_bytes())
            .map_err(|e| StorageError::RocksDb(e.to_string()))?
            .is_some();
        if exists {
            return Err(StorageError::Duplicate(certificate.certificate_id.clone()));
        }

        self.db
            .put_opt(
                key.as_bytes(),
                bytes,
                &self.write_options(WriteKind::Certificate),
            )
            .map_err(|e| StorageError::RocksDb(e.to_string()))
    }

    fn get_certificate(&self, sequence_number: u64) -> Result<Option<Certificate>, StorageError> {
        let key = Self::certificate_key(sequence_number);
        match self.db.get_pinned(key.as_bytes()) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize_certificate(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::RocksDb(e.to_string())),
        }
    }

    fn list_certificates(&self) -> Result<Vec<Certificate>, StorageError> {
        let prefix = format!("{}:", CERTIFICATE_PREFIX);
        let iter = self.db.iterator_opt(
            IteratorMode::From(prefix.as_bytes(), Direction::Forward),
            Self::prefix_read_options(CERTIFICATE_PREFIX),
        );

        let mut certificates = Vec::new();
        for item in iter {
            let (_, value) = item.map_err(|e| StorageError::RocksDb(e.to_string()))?;
            certificates.push(Self::deserialize_certificate(&value)?);
        }
        certificates.reverse();
        Ok(certificates)
    }
}
