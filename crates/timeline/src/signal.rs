//! Subscriber registry for timeline signals.

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{SubscriptionId, TimelineCallback, TimelineSignal};
use parking_lot::Mutex;

/// Callback registry
///
/// `emit` snapshots the callback list and calls it without holding the
/// registry lock, so callbacks may subscribe, unsubscribe or read the
/// timeline re-entrantly.
#[derive(Default)]
pub struct Subscribers {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(SubscriptionId, TimelineCallback)>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: TimelineCallback) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks.lock().push((id, callback));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.callbacks.lock().retain(|(existing, _)| *existing != id);
    }

    pub fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn emit(&self, signal: TimelineSignal) {
        let snapshot: Vec<TimelineCallback> = self
            .callbacks
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        for callback in snapshot {
            callback(signal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let subscribers = Subscribers::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let id = subscribers.subscribe(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        subscribers.emit(TimelineSignal::Cleared);
        subscribers.unsubscribe(id);
        subscribers.emit(TimelineSignal::Cleared);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(subscribers.is_empty());
    }

    #[test]
    fn test_reentrant_unsubscribe() {
        let subscribers = Arc::new(Subscribers::new());
        let inner = subscribers.clone();

        subscribers.subscribe(Arc::new(move |_| {
            inner.unsubscribe(0);
        }));
        subscribers.emit(TimelineSignal::Pushed { timestamp: 1.0 });

        assert!(subscribers.is_empty());
    }
}
