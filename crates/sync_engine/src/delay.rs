//! Per-timeline delay compensation.

use contracts::{SynchronizerConfig, TimelineConfig, TimelineId, TimelineKind, Timestamp};
use tracing::warn;

use crate::error::{Result, SyncError};

/// Delays (ms) indexed by timeline, one table per kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelayTable {
    frames: Vec<u64>,
    matrices: Vec<u64>,
}

impl DelayTable {
    /// Build from configuration, clamping negative values to 0
    pub fn from_config(config: &SynchronizerConfig) -> Self {
        let build = |kind: TimelineKind, timelines: &[TimelineConfig]| -> Vec<u64> {
            timelines
                .iter()
                .enumerate()
                .map(|(index, timeline)| {
                    if timeline.delay < 0 {
                        warn!(
                            timeline = %TimelineId::new(kind, index),
                            delay = timeline.delay,
                            "negative delay clamped to 0"
                        );
                        0
                    } else {
                        timeline.delay as u64
                    }
                })
                .collect()
        };

        Self {
            frames: build(TimelineKind::Frame, &config.frame_timelines),
            matrices: build(TimelineKind::Matrix, &config.matrix_timelines),
        }
    }

    fn table(&self, kind: TimelineKind) -> &Vec<u64> {
        match kind {
            TimelineKind::Frame => &self.frames,
            TimelineKind::Matrix => &self.matrices,
        }
    }

    /// Number of declared timelines of `kind`
    pub fn declared(&self, kind: TimelineKind) -> usize {
        self.table(kind).len()
    }

    /// Delay of a declared timeline
    pub fn get(&self, id: TimelineId) -> Option<u64> {
        self.table(id.kind).get(id.index).copied()
    }

    /// Timestamp to query on `id` for a round at `instant`
    #[inline]
    pub fn query_timestamp(&self, id: TimelineId, instant: Timestamp) -> Timestamp {
        instant - self.get(id).unwrap_or(0) as f64
    }

    /// Update a delay; negative values and undeclared timelines are rejected
    pub fn set(&mut self, id: TimelineId, milliseconds: i64) -> Result<()> {
        let table = match id.kind {
            TimelineKind::Frame => &mut self.frames,
            TimelineKind::Matrix => &mut self.matrices,
        };
        let declared = table.len();
        let slot = table
            .get_mut(id.index)
            .ok_or(SyncError::TimelineOutOfRange {
                timeline: id,
                declared,
            })?;

        if milliseconds < 0 {
            return Err(SyncError::NegativeDelay {
                timeline: id,
                value: milliseconds,
            });
        }

        *slot = milliseconds as u64;
        Ok(())
    }
}
