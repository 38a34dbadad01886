//! Metrics registry for allocation and issuance.
//!
//! Counters are lock-free atomics; per-key state lives in a `DashMap`.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::Histogram;

/// Central registry for all metrics.
#[derive(Default)]
pub struct MetricsRegistry {
    /// Sequence allocator metrics
    pub allocation: Arc<AllocationMetrics>,
    /// Certificate issuance metrics
    pub issuance: Arc<IssuanceMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formats all metrics in Prometheus exposition format.
    pub fn format_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);
        output.push_str(&self.allocation.format_prometheus());
        output.push_str(&self.issuance.format_prometheus());
        output
    }
}

/// Metrics for the sequence allocator.
#[derive(Default)]
pub struct AllocationMetrics {
    /// Successful allocations
    pub allocations_total: AtomicU64,
    /// Allocations that failed in the store
    pub errors_total: AtomicU64,
    /// Calls rejected for a malformed key
    pub invalid_keys_total: AtomicU64,
    /// Store round-trip latency
    pub latency_us: Histogram,
    /// Highest value handed out per key since startup
    last_issued: DashMap<String, u64>,
}

impl AllocationMetrics {
    #[inline]
    pub fn record_allocation(&self, key: &str, seq: u64, latency_us: u64) {
        self.allocations_total.fetch_add(1, Ordering::Relaxed);
        self.latency_us.observe(latency_us);
        // Concurrent callers may report out of order
        self.last_issued
            .entry(key.to_string())
            .and_modify(|v| *v = (*v).max(seq))
            .or_insert(seq);
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_invalid_key(&self) {
        self.invalid_keys_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Highest value this process has handed out for `key`.
    pub fn last_issued(&self, key: &str) -> Option<u64> {
        self.last_issued.get(key).map(|v| *v)
    }

    pub fn format_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        let _ = writeln!(
            output,
            "# HELP tally_allocations_total Successful sequence allocations"
        );
        let _ = writeln!(output, "# TYPE tally_allocations_total counter");
        let _ = writeln!(
            output,
            "tally_allocations_total {}",
            self.allocations_total.load(Ordering::Relaxed)
        );
        output.push('\n');

        let _ = writeln!(
            output,
            "# HELP tally_allocation_errors_total Allocations that failed in storage"
        );
        let _ = writeln!(output, "# TYPE tally_allocation_errors_total counter");
        let _ = writeln!(
            output,
            "tally_allocation_errors_total {}",
            self.errors_total.load(Ordering::Relaxed)
        );
        output.push('\n');

        let _ = writeln!(
            output,
            "# HELP tally_invalid_keys_total Allocations rejected for a malformed key"
        );
        let _ = writeln!(output, "# TYPE tally_invalid_keys_total counter");
        let _ = writeln!(
            output,
            "tally_invalid_keys_total {}",
            self.invalid_keys_total.load(Ordering::Relaxed)
        );
        output.push('\n');

        let _ = writeln!(
            output,
            "# HELP tally_last_issued_sequence Highest sequence issued per key since startup"
        );
        let _ = writeln!(output, "# TYPE tally_last_issued_sequence gauge");
        let mut keys: Vec<(String, u64)> = self
            .last_issued
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        keys.sort();
        for (key, seq) in keys {
            let _ = writeln!(output, "tally_last_issued_sequence{{key=\"{}\"}} {}", key, seq);
        }
        output.push('\n');

        output.push_str(&self.latency_us.format_prometheus(
            "tally_allocation_latency_us",
            "Sequence allocation latency in microseconds",
        ));
        output.push('\n');

        output
    }
}

/// Metrics for certificate issuance.
#[derive(Default)]
pub struct IssuanceMetrics {
    /// Certificates issued and stored
    pub issued_total: AtomicU64,
    /// Requests rejected by validation
    pub rejected_total: AtomicU64,
    /// Requests that failed in allocation or storage
    pub failed_total: AtomicU64,
    /// End-to-end issuance latency
    pub latency_us: Histogram,
}

impl IssuanceMetrics {
    #[inline]
    pub fn record_issued(&self, latency_us: u64) {
        self.issued_total.fetch_add(1, Ordering::Relaxed);
        self.latency_us.observe(latency_us);
    }

    #[inline]
    pub fn record_rejected(&self) {
        self.rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failed(&self) {
        self.failed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn format_prometheus(&self) -> String {
        let mut output = String::with_capacity(1536);

        for (name, help, value) in [
            (
                "tally_certificates_issued_total",
                "Certificates issued",
                &self.issued_total,
            ),
            (
                "tally_certificates_rejected_total",
                "Certificate requests rejected by validation",
                &self.rejected_total,
            ),
            (
                "tally_certificates_failed_total",
                "Certificate requests that failed in allocation or storage",
                &self.failed_total,
            ),
        ] {
            let _ = writeln!(output, "# HELP {} {}", name, help);
            let _ = writeln!(output, "# TYPE {} counter", name);
            let _ = writeln!(output, "{} {}", name, value.load(Ordering::Relaxed));
            output.push('\n');
        }

        output.push_str(&self.latency_us.format_prometheus(
            "tally_issuance_latency_us",
            "Certificate issuance latency in microseconds",
        ));
        output.push('\n');

        output
    }
}
