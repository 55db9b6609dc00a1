//! Observability metrics for the log sink.
//!
//! Counts what happened to every error occurrence submitted to the sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters describing sink behavior.
///
/// All counters use atomic operations. Clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Entries handed to the transport
    entries_forwarded: AtomicU64,
    /// Occurrences dropped by the window policy
    entries_suppressed: AtomicU64,
    /// Occurrences skipped by the severity allow-list
    entries_filtered: AtomicU64,
    /// Entries the transport refused
    transport_failures: AtomicU64,
    /// Dedup keys evicted from storage
    keys_evicted: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub(crate) fn record_forwarded(&self) {
        self.inner.entries_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suppressed(&self) {
        self.inner.entries_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_filtered(&self) {
        self.inner.entries_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transport_failure(&self) {
        self.inner.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.inner.keys_evicted.fetch_add(1, Ordering::Relaxed);
    }

    /// Entries handed to the transport.
    pub fn entries_forwarded(&self) -> u64 {
        self.inner.entries_forwarded.load(Ordering::Relaxed)
    }

    /// Occurrences dropped by the window policy.
    pub fn entries_suppressed(&self) -> u64 {
        self.inner.entries_suppressed.load(Ordering::Relaxed)
    }

    /// Occurrences skipped by the severity allow-list.
    pub fn entries_filtered(&self) -> u64 {
        self.inner.entries_filtered.load(Ordering::Relaxed)
    }

    /// Entries the transport refused.
    pub fn transport_failures(&self) -> u64 {
        self.inner.transport_failures.load(Ordering::Relaxed)
    }

    /// Dedup keys evicted from storage.
    pub fn keys_evicted(&self) -> u64 {
        self.inner.keys_evicted.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            entries_forwarded: self.entries_forwarded(),
            entries_suppressed: self.entries_suppressed(),
            entries_filtered: self.entries_filtered(),
            transport_failures: self.transport_failures(),
            keys_evicted: self.keys_evicted(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.entries_forwarded.store(0, Ordering::Relaxed);
        self.inner.entries_suppressed.store(0, Ordering::Relaxed);
        self.inner.entries_filtered.store(0, Ordering::Relaxed);
        self.inner.transport_failures.store(0, Ordering::Relaxed);
        self.inner.keys_evicted.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Entries handed to the transport
    pub entries_forwarded: u64,
    /// Occurrences dropped by the window policy
    pub entries_suppressed: u64,
    /// Occurrences skipped by the severity allow-list
    pub entries_filtered: u64,
    /// Entries the transport refused
    pub transport_failures: u64,
    /// Dedup keys evicted from storage
    pub keys_evicted: u64,
}

impl MetricsSnapshot {
    /// Ratio of suppressed occurrences to rate-limited ones (0.0 to 1.0).
    ///
    /// Filtered occurrences never reach the rate limiter and are not counted.
    pub fn suppression_rate(&self) -> f64 {
        let total = self.entries_forwarded.saturating_add(self.entries_suppressed);
        if total == 0 {
            0.0
        } else {
            self.entries_suppressed as f64 / total as f64
        }
    }

    /// Every occurrence submitted to the sink.
    pub fn total_occurrences(&self) -> u64 {
        self.entries_forwarded
            .saturating_add(self.entries_suppressed)
            .saturating_add(self.entries_filtered)
    }
}
