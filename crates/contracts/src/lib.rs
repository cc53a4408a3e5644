//! # Contracts
//!
//! Frozen interface contracts (ICD), defining the data structures and traits
//! shared by timelines, the synchronizer and its outputs.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Timestamps are milliseconds (f64) since a process-local epoch
//! - Only differences and comparisons between timestamps are meaningful
//! - Frame timelines and matrix timelines have separate index spaces

mod blueprint;
mod config;
mod error;
mod event;
mod output;
mod time;
mod timeline;
mod timeline_id;

pub use blueprint::*;
pub use config::*;
pub use error::*;
pub use event::SyncEvent;
pub use output::*;
pub use time::{Timestamp, TimelineKind};
pub use timeline::*;
pub use timeline_id::TimelineId;
