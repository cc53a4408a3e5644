//! Time model and timeline kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds since a process-local epoch.
pub type Timestamp = f64;

/// Kind of timeline (and of the output slots fed from it)
///
/// Each kind owns its own index space: frame timeline 0 and matrix
/// timeline 0 are unrelated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    /// Pixel buffers (video, ultrasound, ...)
    Frame,
    /// Rigid 4x4 transforms (trackers)
    Matrix,
}

impl TimelineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineKind::Frame => "frame",
            TimelineKind::Matrix => "matrix",
        }
    }
}

impl fmt::Display for TimelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
