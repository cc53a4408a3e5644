//! Storage core shared by frame and matrix timelines.

use std::sync::Arc;

use contracts::{SubscriptionId, TimelineCallback, TimelineSignal, Timestamp};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{Result, TimelineError};
use crate::history::History;
use crate::signal::Subscribers;
use crate::stats::{TimelineMetrics, TimelineMetricsSnapshot};

pub(crate) struct TimelineStore<B> {
    name: String,
    history: Mutex<History<B>>,
    subscribers: Subscribers,
    metrics: TimelineMetrics,
}

impl<B> TimelineStore<B> {
    pub(crate) fn new(name: &str, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(TimelineError::ZeroCapacity {
                name: name.to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            history: Mutex::new(History::new(capacity)),
            subscribers: Subscribers::new(),
            metrics: TimelineMetrics::new(),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn push(&self, timestamp: Timestamp, buffer: B) {
        let (evicted, out_of_order) = {
            let mut history = self.history.lock();
            let before = history.out_of_order_count();
            let evicted = history.push(timestamp, Arc::new(buffer));
            (evicted, history.out_of_order_count() > before)
        };

        self.metrics.record_pushed();
        if evicted {
            self.metrics.record_evicted();
        }
        if out_of_order {
            self.metrics.record_out_of_order();
            debug!(timeline = %self.name, timestamp, "out-of-order buffer pushed");
        }
        metrics::counter!("timeline_buffers_pushed_total", "timeline" => self.name.clone())
            .increment(1);
        trace!(timeline = %self.name, timestamp, "buffer pushed");

        self.subscribers.emit(TimelineSignal::Pushed { timestamp });
    }

    pub(crate) fn clear(&self) {
        self.history.lock().clear();
        self.metrics.record_cleared();
        debug!(timeline = %self.name, "timeline cleared");

        self.subscribers.emit(TimelineSignal::Cleared);
    }

    pub(crate) fn newest_timestamp(&self) -> Option<Timestamp> {
        self.history.lock().newest_timestamp()
    }

    pub(crate) fn closest(&self, target: Timestamp) -> Option<Arc<B>> {
        self.history.lock().closest(target)
    }

    pub(crate) fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub(crate) fn subscribe(&self, callback: TimelineCallback) -> SubscriptionId {
        self.subscribers.subscribe(callback)
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.unsubscribe(id);
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub(crate) fn metrics(&self) -> TimelineMetricsSnapshot {
        self.metrics.snapshot()
    }
}
