//! Timeline counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Timeline metrics
#[derive(Debug, Default)]
pub struct TimelineMetrics {
    /// Total buffers pushed
    pub buffers_pushed: AtomicU64,

    /// Buffers evicted because the history was full
    pub buffers_evicted: AtomicU64,

    /// Buffers older than their predecessor
    pub out_of_order: AtomicU64,

    /// Number of clears
    pub clears: AtomicU64,
}

impl TimelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pushed(&self) {
        self.buffers_pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self) {
        self.buffers_evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_out_of_order(&self) {
        self.out_of_order.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cleared(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> TimelineMetricsSnapshot {
        TimelineMetricsSnapshot {
            buffers_pushed: self.buffers_pushed.load(Ordering::Relaxed),
            buffers_evicted: self.buffers_evicted.load(Ordering::Relaxed),
            out_of_order: self.out_of_order.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimelineMetricsSnapshot {
    pub buffers_pushed: u64,
    pub buffers_evicted: u64,
    pub out_of_order: u64,
    pub clears: u64,
}
