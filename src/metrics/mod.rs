//! Observability metrics for tally.
//!
//! All hot-path counters are lock-free atomics.

pub mod histogram;
pub mod registry;

pub use histogram::Histogram;
pub use registry::{AllocationMetrics, IssuanceMetrics, MetricsRegistry};
