mod memory;
mod rocksdb;

pub use memory::InMemoryStorage;
pub use rocksdb::{RocksDbStorage, WriteKind};
