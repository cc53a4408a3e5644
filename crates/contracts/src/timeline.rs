//! Timeline traits - time-indexed sample sources consumed by the synchronizer
//!
//! A timeline is a history of multiplexed buffers ordered by timestamp.
//! The synchronizer only reads from timelines: it asks for the newest
//! timestamp, for the buffer closest to a target time, and listens for
//! push/clear signals. Storage and matching policy belong to the implementation.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Handle returned by [`TimelineSource::subscribe`]
pub type SubscriptionId = u64;

/// Signal emitted by a timeline to its subscribers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelineSignal {
    /// A new buffer was pushed
    Pushed { timestamp: Timestamp },
    /// The history was cleared
    Cleared,
}

/// Timeline signal callback type
///
/// Implementations must invoke callbacks after releasing their own locks:
/// a subscriber is allowed to read the timeline from inside the callback.
pub type TimelineCallback = Arc<dyn Fn(TimelineSignal) + Send + Sync>;

/// Behavior shared by frame and matrix timelines
pub trait TimelineSource: Send + Sync {
    /// Timestamp of the newest buffer, `None` when the timeline is empty
    fn newest_timestamp(&self) -> Option<Timestamp>;

    /// Register a signal callback
    fn subscribe(&self, callback: TimelineCallback) -> SubscriptionId;

    /// Remove a callback; unknown ids are ignored
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Timeline of pixel buffers
pub trait FrameTimeline: TimelineSource {
    /// Geometry shared by every buffer of this timeline
    fn geometry(&self) -> FrameGeometry;

    /// Buffer best matching `target`, according to the timeline's policy
    fn closest_buffer(&self, target: Timestamp) -> Option<Arc<FrameBuffer>>;
}

/// Timeline of 4x4 transforms
pub trait MatrixTimeline: TimelineSource {
    /// Buffer best matching `target`, according to the timeline's policy
    fn closest_buffer(&self, target: Timestamp) -> Option<Arc<MatrixBuffer>>;
}

/// Pixel layout declared by a frame timeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelinePixelFormat {
    GrayScale,
    Rgb,
    Bgr,
    Rgba,
    Bgra,
    #[default]
    Undefined,
}

/// Scalar type of one pixel component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    #[default]
    U8,
    U16,
    F32,
}

impl ComponentType {
    /// Size of one component in bytes
    #[inline]
    pub fn size(&self) -> usize {
        match self {
            ComponentType::U8 => 1,
            ComponentType::U16 => 2,
            ComponentType::F32 => 4,
        }
    }
}

/// Geometry of a frame timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameGeometry {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Components per pixel
    pub components: u8,
    /// Component scalar type
    pub component_type: ComponentType,
    /// Pixel layout
    pub pixel_format: TimelinePixelFormat,
}

impl FrameGeometry {
    /// Byte size of one frame element
    #[inline]
    pub fn element_size(&self) -> usize {
        self.width as usize
            * self.height as usize
            * self.components as usize
            * self.component_type.size()
    }
}

/// One sample of a frame timeline
///
/// A buffer multiplexes up to N elements; absent elements are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    pub timestamp: Timestamp,
    pub elements: Vec<Option<Bytes>>,
}

impl FrameBuffer {
    pub fn new(timestamp: Timestamp, max_elements: usize) -> Self {
        Self {
            timestamp,
            elements: vec![None; max_elements],
        }
    }

    #[inline]
    pub fn is_present(&self, index: usize) -> bool {
        matches!(self.elements.get(index), Some(Some(_)))
    }

    #[inline]
    pub fn element(&self, index: usize) -> Option<&Bytes> {
        self.elements.get(index).and_then(Option::as_ref)
    }
}

/// Row-major 4x4 transform values
pub type MatrixValues = [f32; 16];

/// One sample of a matrix timeline
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixBuffer {
    pub timestamp: Timestamp,
    pub elements: Vec<Option<MatrixValues>>,
}

impl MatrixBuffer {
    pub fn new(timestamp: Timestamp, max_elements: usize) -> Self {
        Self {
            timestamp,
            elements: vec![None; max_elements],
        }
    }

    #[inline]
    pub fn is_present(&self, index: usize) -> bool {
        matches!(self.elements.get(index), Some(Some(_)))
    }

    #[inline]
    pub fn element(&self, index: usize) -> Option<&MatrixValues> {
        self.elements.get(index).and_then(Option::as_ref)
    }
}
