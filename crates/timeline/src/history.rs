//! Fixed-capacity sample history with timestamp lookup.
//!
//! Uses index-based separation:
//! - HeapRb stores lightweight metadata (timestamp + slab key)
//! - Slab stores the shared buffers
//!
//! Evicting or scanning only moves metadata, never pixel payloads.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use contracts::Timestamp;
use ringbuf::{traits::*, HeapRb};
use slab::Slab;

/// Lightweight metadata stored in ring buffer
#[derive(Debug, Clone, Copy)]
struct SampleMeta {
    /// Timestamp for lookup
    timestamp: Timestamp,
    /// Key into the slab storage
    slab_key: usize,
}

/// Per-timeline history, oldest insertion evicted first when full
pub struct History<B> {
    /// Ring buffer of metadata in insertion order
    index: HeapRb<SampleMeta>,
    /// Actual buffer storage
    storage: Slab<Arc<B>>,
    capacity: usize,
    evicted_count: u64,
    out_of_order_count: u64,
    last_timestamp: Option<Timestamp>,
}

impl<B> fmt::Debug for History<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("len", &self.index.occupied_len())
            .field("capacity", &self.capacity)
            .field("evicted", &self.evicted_count)
            .finish()
    }
}

impl<B> History<B> {
    /// Create a history holding at most `capacity` samples (`capacity > 0`)
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self {
            index: HeapRb::new(capacity),
            storage: Slab::with_capacity(capacity),
            capacity,
            evicted_count: 0,
            out_of_order_count: 0,
            last_timestamp: None,
        }
    }

    /// Push a sample
    ///
    /// If the history is full, the oldest inserted sample is evicted.
    /// Returns `true` when a sample was evicted.
    #[inline]
    pub fn push(&mut self, timestamp: Timestamp, buffer: Arc<B>) -> bool {
        if let Some(last) = self.last_timestamp {
            if timestamp < last {
                self.out_of_order_count += 1;
            }
        }
        self.last_timestamp = Some(timestamp);

        let mut evicted = false;
        if self.index.is_full() {
            if let Some(old_meta) = self.index.try_pop() {
                self.storage.remove(old_meta.slab_key);
            }
            self.evicted_count += 1;
            evicted = true;
        }

        let slab_key = self.storage.insert(buffer);
        let _ = self.index.try_push(SampleMeta {
            timestamp,
            slab_key,
        });
        evicted
    }

    /// Largest timestamp held
    #[inline]
    pub fn newest_timestamp(&self) -> Option<Timestamp> {
        self.index
            .iter()
            .map(|m| m.timestamp)
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
    }

    /// Sample nearest to `target`; on equal distance the earlier sample wins
    #[inline]
    pub fn closest(&self, target: Timestamp) -> Option<Arc<B>> {
        self.index
            .iter()
            .min_by(|a, b| {
                let da = (a.timestamp - target).abs();
                let db = (b.timestamp - target).abs();
                da.partial_cmp(&db)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| {
                        a.timestamp
                            .partial_cmp(&b.timestamp)
                            .unwrap_or(Ordering::Equal)
                    })
            })
            .and_then(|meta| self.storage.get(meta.slab_key))
            .cloned()
    }

    /// Drop every sample
    #[inline]
    pub fn clear(&mut self) {
        let _ = self.index.pop_iter().count();
        self.storage.clear();
        self.last_timestamp = None;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn evicted_count(&self) -> u64 {
        self.evicted_count
    }

    #[inline]
    pub fn out_of_order_count(&self) -> u64 {
        self.out_of_order_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_with(timestamps: &[Timestamp]) -> History<Timestamp> {
        let mut history = History::new(10);
        for &ts in timestamps {
            history.push(ts, Arc::new(ts));
        }
        history
    }

    #[test]
    fn test_history_capacity() {
        let mut history = History::new(3);
        for ts in [1.0, 2.0, 3.0, 4.0] {
            history.push(ts, Arc::new(ts));
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.evicted_count(), 1);
        assert_eq!(history.closest(0.0).map(|b| *b), Some(2.0));
    }

    #[test]
    fn test_closest_nearest_overall() {
        let history = history_with(&[100.0, 111.0, 150.0]);

        assert_eq!(history.closest(110.0).map(|b| *b), Some(111.0));
        assert_eq!(history.closest(500.0).map(|b| *b), Some(150.0));
        assert_eq!(history.closest(-5.0).map(|b| *b), Some(100.0));
    }

    #[test]
    fn test_closest_tie_prefers_earlier() {
        let history = history_with(&[120.0, 100.0]);
        assert_eq!(history.closest(110.0).map(|b| *b), Some(100.0));
    }

    #[test]
    fn test_newest_with_out_of_order() {
        let history = history_with(&[1.0, 3.0, 2.0]);

        assert_eq!(history.newest_timestamp(), Some(3.0));
        assert_eq!(history.out_of_order_count(), 1);
    }

    #[test]
    fn test_clear() {
        let mut history = history_with(&[1.0, 2.0]);
        history.clear();

        assert!(history.is_empty());
        assert_eq!(history.newest_timestamp(), None);
        assert!(history.closest(1.0).is_none());
    }
}
