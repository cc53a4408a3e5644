//! In-memory frame timeline

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use contracts::{
    FrameBuffer, FrameGeometry, FrameTimeline, SubscriptionId, TimelineCallback, TimelineSource,
    Timestamp,
};

use crate::error::{Result, TimelineError};
use crate::stats::TimelineMetricsSnapshot;
use crate::store::TimelineStore;

/// Frame timeline backed by a bounded in-memory history
///
/// `closest_buffer` returns the sample nearest to the target overall
/// (earlier sample on ties).
pub struct FrameTimelineBuffer {
    geometry: FrameGeometry,
    max_elements: usize,
    store: TimelineStore<FrameBuffer>,
}

impl fmt::Debug for FrameTimelineBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameTimelineBuffer")
            .field("name", &self.store.name())
            .field("geometry", &self.geometry)
            .field("max_elements", &self.max_elements)
            .field("len", &self.store.len())
            .finish()
    }
}

impl FrameTimelineBuffer {
    /// Create a frame timeline
    ///
    /// # Arguments
    /// * `name` - label used in logs and metrics
    /// * `capacity` - number of samples kept
    /// * `geometry` - geometry shared by every buffer
    /// * `max_elements` - elements multiplexed in one buffer
    pub fn new(
        name: &str,
        capacity: usize,
        geometry: FrameGeometry,
        max_elements: usize,
    ) -> Result<Self> {
        if geometry.width == 0 || geometry.height == 0 || geometry.components == 0 {
            return Err(TimelineError::InvalidGeometry {
                name: name.to_string(),
                message: format!(
                    "width, height and components must be non-zero (got {}x{}x{})",
                    geometry.width, geometry.height, geometry.components
                ),
            });
        }
        if max_elements == 0 {
            return Err(TimelineError::InvalidGeometry {
                name: name.to_string(),
                message: "a buffer needs at least one element".to_string(),
            });
        }

        Ok(Self {
            geometry,
            max_elements,
            store: TimelineStore::new(name, capacity)?,
        })
    }

    /// Create a shared handle
    pub fn shared(
        name: &str,
        capacity: usize,
        geometry: FrameGeometry,
        max_elements: usize,
    ) -> Result<Arc<Self>> {
        Self::new(name, capacity, geometry, max_elements).map(Arc::new)
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn max_elements(&self) -> usize {
        self.max_elements
    }

    /// Empty buffer (every element absent) at `timestamp`
    pub fn create_buffer(&self, timestamp: Timestamp) -> FrameBuffer {
        FrameBuffer::new(timestamp, self.max_elements)
    }

    /// Fill one element of a buffer, checking index and byte size
    pub fn set_element(&self, buffer: &mut FrameBuffer, index: usize, data: Bytes) -> Result<()> {
        let expected = self.geometry.element_size();
        if data.len() != expected {
            return Err(TimelineError::ElementSizeMismatch {
                name: self.name().to_string(),
                expected,
                actual: data.len(),
            });
        }
        let slot = buffer
            .elements
            .get_mut(index)
            .ok_or_else(|| TimelineError::ElementOutOfRange {
                name: self.name().to_string(),
                index,
                max_elements: self.max_elements,
            })?;
        *slot = Some(data);
        Ok(())
    }

    /// Push a buffer and signal subscribers
    pub fn push(&self, buffer: FrameBuffer) {
        self.store.push(buffer.timestamp, buffer);
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

impl TimelineSource for FrameTimelineBuffer {
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

impl FrameTimeline for FrameTimelineBuffer {
    fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    fn closest_buffer(&self, target: Timestamp) -> Option<Arc<FrameBuffer>> {
        self.store.closest(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ComponentType, TimelineSignal, TimelinePixelFormat};
    use parking_lot::Mutex;

    fn gray_2x2() -> FrameGeometry {
        FrameGeometry {
            width: 2,
            height: 2,
            components: 1,
            component_type: ComponentType::U8,
            pixel_format: TimelinePixelFormat::GrayScale,
        }
    }

    #[test]
    fn test_rejects_bad_geometry() {
        let mut geometry = gray_2x2();
        geometry.width = 0;
        assert!(FrameTimelineBuffer::new("video", 4, geometry, 1).is_err());
        assert!(FrameTimelineBuffer::new("video", 0, gray_2x2(), 1).is_err());
        assert!(FrameTimelineBuffer::new("video", 4, gray_2x2(), 0).is_err());
    }

    #[test]
    fn test_set_element_checks() {
        let timeline = FrameTimelineBuffer::new("video", 4, gray_2x2(), 2).unwrap();
        let mut buffer = timeline.create_buffer(10.0);

        assert!(matches!(
            timeline.set_element(&mut buffer, 0, Bytes::from_static(&[1, 2])),
            Err(TimelineError::ElementSizeMismatch { expected: 4, .. })
        ));
        assert!(matches!(
            timeline.set_element(&mut buffer, 2, Bytes::from_static(&[1, 2, 3, 4])),
            Err(TimelineError::ElementOutOfRange { .. })
        ));
        timeline
            .set_element(&mut buffer, 1, Bytes::from_static(&[1, 2, 3, 4]))
            .unwrap();
        assert!(!buffer.is_present(0));
        assert!(buffer.is_present(1));
    }

    #[test]
    fn test_push_and_lookup() {
        let timeline = FrameTimelineBuffer::new("video", 4, gray_2x2(), 1).unwrap();
        assert_eq!(timeline.newest_timestamp(), None);

        timeline.push(timeline.create_buffer(100.0));
        timeline.push(timeline.create_buffer(140.0));

        assert_eq!(timeline.newest_timestamp(), Some(140.0));
        assert_eq!(
            timeline.closest_buffer(125.0).map(|b| b.timestamp),
            Some(140.0)
        );
        assert_eq!(timeline.metrics().buffers_pushed, 2);
    }

    #[test]
    fn test_signals_after_unlock() {
        let timeline = Arc::new(FrameTimelineBuffer::new("video", 4, gray_2x2(), 1).unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let reader = Arc::downgrade(&timeline);
        let sink = seen.clone();
        timeline.subscribe(Arc::new(move |signal| {
            // Reading the timeline from the callback must not deadlock
            let newest = reader.upgrade().and_then(|t| t.newest_timestamp());
            sink.lock().push((signal, newest));
        }));

        timeline.push(timeline.create_buffer(5.0));
        timeline.clear();

        let seen = seen.lock();
        assert_eq!(
            seen[0],
            (TimelineSignal::Pushed { timestamp: 5.0 }, Some(5.0))
        );
        assert_eq!(seen[1], (TimelineSignal::Cleared, None));
    }
}
