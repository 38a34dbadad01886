pub mod certificate;
pub mod counter;
pub mod error;
pub mod sequence;

pub use certificate::{Certificate, CertificateStore};
pub use counter::{Counter, CounterStore};
pub use error::{AllocationError, IssuanceError, LockResultExt, StorageError};
pub use sequence::SequenceAllocator;
