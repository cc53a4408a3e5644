//! In-memory matrix timeline

use std::fmt;
use std::sync::Arc;

use contracts::{
    MatrixBuffer, MatrixTimeline, MatrixValues, SubscriptionId, TimelineCallback, TimelineSource,
    Timestamp,
};

use crate::error::{Result, TimelineError};
use crate::stats::TimelineMetricsSnapshot;
use crate::store::TimelineStore;

/// Matrix timeline backed by a bounded in-memory history
pub struct MatrixTimelineBuffer {
    max_elements: usize,
    store: TimelineStore<MatrixBuffer>,
}

impl fmt::Debug for MatrixTimelineBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatrixTimelineBuffer")
            .field("name", &self.store.name())
            .field("max_elements", &self.max_elements)
            .field("len", &self.store.len())
            .finish()
    }
}

impl MatrixTimelineBuffer {
    pub fn new(name: &str, capacity: usize, max_elements: usize) -> Result<Self> {
        if max_elements == 0 {
            return Err(TimelineError::InvalidGeometry {
                name: name.to_string(),
                message: "a buffer needs at least one element".to_string(),
            });
        }
        Ok(Self {
            max_elements,
            store: TimelineStore::new(name, capacity)?,
        })
    }

    /// Create a shared handle
    pub fn shared(name: &str, capacity: usize, max_elements: usize) -> Result<Arc<Self>> {
        Self::new(name, capacity, max_elements).map(Arc::new)
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn max_elements(&self) -> usize {
        self.max_elements
    }

    /// Empty buffer (every element absent) at `timestamp`
    pub fn create_buffer(&self, timestamp: Timestamp) -> MatrixBuffer {
        MatrixBuffer::new(timestamp, self.max_elements)
    }

    /// Fill one element of a buffer
    pub fn set_element(
        &self,
        buffer: &mut MatrixBuffer,
        index: usize,
        values: MatrixValues,
    ) -> Result<()> {
        let slot = buffer
            .elements
            .get_mut(index)
            .ok_or_else(|| TimelineError::ElementOutOfRange {
                name: self.name().to_string(),
                index,
                max_elements: self.max_elements,
            })?;
        *slot = Some(values);
        Ok(())
    }

    /// Push a buffer and signal subscribers
    pub fn push(&self, buffer: MatrixBuffer) {
        self.store.push(buffer.timestamp, buffer);
    }

    /// Push a buffer holding a single matrix at element 0
    pub fn push_matrix(&self, timestamp: Timestamp, values: MatrixValues) {
        let mut buffer = self.create_buffer(timestamp);
        buffer.elements[0] = Some(values);
        self.push(buffer);
    }

    /// Drop the history and signal subscribers
    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscriber_count(&self) -> usize {
        self.store.subscriber_count()
    }

    pub fn metrics(&self) -> TimelineMetricsSnapshot {
        self.store.metrics()
    }
}

impl TimelineSource for MatrixTimelineBuffer {
    fn newest_timestamp(&self) -> Option<Timestamp> {
        self.store.newest_timestamp()
    }

    fn subscribe(&self, callback: TimelineCallback) -> SubscriptionId {
        self.store.subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.store.unsubscribe(id);
    }
}

impl MatrixTimeline for MatrixTimelineBuffer {
    fn closest_buffer(&self, target: Timestamp) -> Option<Arc<MatrixBuffer>> {
        self.store.closest(target)
    }
}
