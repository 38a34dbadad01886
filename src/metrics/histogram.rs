//! Lock-free latency histogram with Prometheus exposition.
//!
//! Bucket bounds cover everything from a memtable hit to a slow fsync.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Upper bucket bounds in microseconds.
pub const LATENCY_BUCKETS_US: [u64; 10] = [
    50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 50_000, 250_000,
];

/// Latency histogram with cumulative buckets.
///
/// ```
/// use tally::metrics::Histogram;
///
/// let histogram = Histogram::new();
/// histogram.observe(300);
/// assert_eq!(histogram.count(), 1);
/// assert_eq!(histogram.bucket_counts()[3], 1); // le=500
/// ```
pub struct Histogram {
    sum: AtomicU64,
    count: AtomicU64,
    buckets: [AtomicU64; LATENCY_BUCKETS_US.len()],
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Records one observation.
    #[inline]
    pub fn observe(&self, value_us: u64) {
        self.sum.fetch_add(value_us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        for (bucket, &bound) in self.buckets.iter().zip(LATENCY_BUCKETS_US.iter()) {
            if value_us <= bound {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    /// Cumulative count per bucket, in `LATENCY_BUCKETS_US` order.
    pub fn bucket_counts(&self) -> [u64; LATENCY_BUCKETS_US.len()] {
        std::array::from_fn(|i| self.buckets[i].load(Ordering::Relaxed))
    }

    /// Mean of all observations, 0 when empty.
    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Formats the histogram in Prometheus text exposition format.
    pub fn format_prometheus(&self, name: &str, help: &str) -> String {
        let mut output = String::with_capacity(768);
        let _ = writeln!(output, "# HELP {} {}", name, help);
        let _ = writeln!(output, "# TYPE {} histogram", name);
        for (count, bound) in self.bucket_counts().iter().zip(LATENCY_BUCKETS_US.iter()) {
            let _ = writeln!(output, "{}_bucket{{le=\"{}\"}} {}", name, bound, count);
        }
        let _ = writeln!(output, "{}_bucket{{le=\"+Inf\"}} {}", name, self.count());
        let _ = writeln!(output, "{}_sum {}", name, self.sum());
        let _ = writeln!(output, "{}_count {}", name, self.count());
        output
    }
}
