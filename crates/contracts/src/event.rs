//! SyncEvent - Synchronizer output events

use serde::{Deserialize, Serialize};

use crate::{TimelineKind, Timestamp};

/// Event emitted by the synchronizer
///
/// Slot events are edge-triggered: they fire only when a slot's
/// synchronized status changes, and only for slots with
/// `notify_on_change` enabled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A round completed at the given instant
    SynchronizationDone { timestamp: Timestamp },
    /// A round found nothing to do (no data or redundant instant)
    SynchronizationSkipped,
    FrameSlotSynchronized { slot: usize },
    FrameSlotUnsynchronized { slot: usize },
    MatrixSlotSynchronized { slot: usize },
    MatrixSlotUnsynchronized { slot: usize },
}

impl SyncEvent {
    /// Slot status transition event for an output of the given kind
    pub fn slot_transition(kind: TimelineKind, slot: usize, synchronized: bool) -> Self {
        match (kind, synchronized) {
            (TimelineKind::Frame, true) => SyncEvent::FrameSlotSynchronized { slot },
            (TimelineKind::Frame, false) => SyncEvent::FrameSlotUnsynchronized { slot },
            (TimelineKind::Matrix, true) => SyncEvent::MatrixSlotSynchronized { slot },
            (TimelineKind::Matrix, false) => SyncEvent::MatrixSlotUnsynchronized { slot },
        }
    }

    /// Short name used as a metric label
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::SynchronizationDone { .. } => "synchronization_done",
            SyncEvent::SynchronizationSkipped => "synchronization_skipped",
            SyncEvent::FrameSlotSynchronized { .. } => "frame_slot_synchronized",
            SyncEvent::FrameSlotUnsynchronized { .. } => "frame_slot_unsynchronized",
            SyncEvent::MatrixSlotSynchronized { .. } => "matrix_slot_synchronized",
            SyncEvent::MatrixSlotUnsynchronized { .. } => "matrix_slot_unsynchronized",
        }
    }
}
