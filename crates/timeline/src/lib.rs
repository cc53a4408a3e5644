//! # Timeline
//!
//! In-memory timelines feeding the synchronizer.
//!
//! Responsibilities:
//! - Bounded history of multiplexed buffers per timeline
//! - Newest timestamp and nearest-sample lookup
//! - Push/clear signals delivered to subscribers outside the timeline lock
//! - Mock producers pushing synthetic samples at a fixed rate
//!
//! ## Usage Example
//!
//! ```ignore
//! use timeline::{MatrixTimelineBuffer, MockProducer, MockProducerConfig, SessionClock};
//!
//! let tracker = MatrixTimelineBuffer::shared("tracker", 64, 1)?;
//! tracker.push_matrix(1000.0, identity);
//!
//! let producer = MockProducer::matrices(tracker.clone(), MockProducerConfig::default());
//! let handle = producer.start(SessionClock::new());
//! ```

mod error;
mod frame;
mod history;
mod matrix;
mod mock;
mod signal;
mod stats;
mod store;

// Re-exports
pub use error::{Result, TimelineError};
pub use frame::FrameTimelineBuffer;
pub use history::History;
pub use matrix::MatrixTimelineBuffer;
pub use mock::{MockProducer, MockProducerConfig, SessionClock};
pub use signal::Subscribers;
pub use stats::{TimelineMetrics, TimelineMetricsSnapshot};
