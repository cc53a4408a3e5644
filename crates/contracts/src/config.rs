//! Synchronizer configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{TimelineId, TimelineKind, Timestamp};

/// Default tolerance window (ms)
pub const DEFAULT_TOLERANCE_MS: f64 = 500.0;

/// Default timer period in legacy auto-sync mode (ms)
pub const DEFAULT_TIMER_PERIOD_MS: u64 = 15;

/// Synchronizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SynchronizerConfig {
    /// Maximum distance (ms) between the newest timeline and any included one
    #[serde(default = "default_tolerance")]
    #[validate(range(exclusive_min = 0.0))]
    pub tolerance: Timestamp,

    /// `true` = synchronize on a periodic timer, `false` = on request
    #[serde(default)]
    pub legacy_auto_sync: bool,

    /// Timer period (ms), only used when `legacy_auto_sync` is set
    #[serde(default = "default_timer_period")]
    #[validate(range(min = 1))]
    pub timer_period: u64,

    /// Declared frame timelines, in attachment order
    #[serde(default)]
    pub frame_timelines: Vec<TimelineConfig>,

    /// Declared matrix timelines, in attachment order
    #[serde(default)]
    pub matrix_timelines: Vec<TimelineConfig>,

    /// Frame output slots
    #[serde(default)]
    pub frame_outputs: Vec<OutputSlotConfig>,

    /// Matrix output slots
    #[serde(default)]
    pub matrix_outputs: Vec<OutputSlotConfig>,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE_MS,
            legacy_auto_sync: false,
            timer_period: DEFAULT_TIMER_PERIOD_MS,
            frame_timelines: Vec::new(),
            matrix_timelines: Vec::new(),
            frame_outputs: Vec::new(),
            matrix_outputs: Vec::new(),
        }
    }
}

impl SynchronizerConfig {
    /// Timelines declared for `kind`
    pub fn timelines(&self, kind: TimelineKind) -> &[TimelineConfig] {
        match kind {
            TimelineKind::Frame => &self.frame_timelines,
            TimelineKind::Matrix => &self.matrix_timelines,
        }
    }

    /// Output slots declared for `kind`
    pub fn outputs(&self, kind: TimelineKind) -> &[OutputSlotConfig] {
        match kind {
            TimelineKind::Frame => &self.frame_outputs,
            TimelineKind::Matrix => &self.matrix_outputs,
        }
    }

    /// Human-readable label of a timeline: its configured name or its id
    pub fn timeline_label(&self, id: TimelineId) -> String {
        self.timelines(id.kind)
            .get(id.index)
            .and_then(|t| t.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

/// Per-timeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Optional label used in logs
    #[serde(default)]
    pub name: Option<String>,

    /// Delay (ms) subtracted from the instant before querying this timeline
    ///
    /// Signed so that negative input can be detected and clamped.
    #[serde(default)]
    pub delay: i64,
}

/// Per-output-slot binding configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSlotConfig {
    /// Timeline feeding this slot
    #[serde(default)]
    pub timeline_index: usize,

    /// Element within the timeline's multiplexed buffer
    #[serde(default)]
    pub element_index: usize,

    /// Emit slot (un)synchronized events for this slot
    #[serde(default)]
    pub notify_on_change: bool,
}

fn default_tolerance() -> Timestamp {
    DEFAULT_TOLERANCE_MS
}

fn default_timer_period() -> u64 {
    DEFAULT_TIMER_PERIOD_MS
}
