//! Event fan-out and edge-triggered slot status.

use std::collections::BTreeSet;

use contracts::{SyncEvent, TimelineKind};
use tokio::sync::mpsc;
use tracing::debug;

use crate::binding::BindingTable;
use crate::selector::InclusionSet;

/// Unbounded fan-out of [`SyncEvent`]s
///
/// Sending never blocks; subscribers whose receiver was dropped are pruned
/// on the next emission.
#[derive(Debug, Default)]
pub(crate) struct EventBus {
    subscribers: Vec<mpsc::UnboundedSender<SyncEvent>>,
}

impl EventBus {
    pub(crate) fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SyncEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub(crate) fn emit(&mut self, event: SyncEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }
}

/// Update `is_synchronized` for every notifying binding and return one
/// event per changed slot
///
/// Matrix slots listed in `unevaluated_matrix` keep their status.
pub(crate) fn slot_transitions(
    bindings: &mut BindingTable,
    included: &InclusionSet,
    unevaluated_matrix: &BTreeSet<usize>,
) -> Vec<SyncEvent> {
    let mut events = Vec::new();

    for kind in [TimelineKind::Frame, TimelineKind::Matrix] {
        for binding in bindings.bindings_mut(kind) {
            if !binding.notify_on_change {
                continue;
            }
            if kind == TimelineKind::Matrix && unevaluated_matrix.contains(&binding.slot) {
                continue;
            }

            let synchronized = included.contains(kind, binding.timeline_index);
            if synchronized != binding.is_synchronized {
                binding.is_synchronized = synchronized;
                debug!(kind = %kind, slot = binding.slot, synchronized, "slot status changed");
                observability::record_slot_transition(kind, binding.slot, synchronized);
                events.push(SyncEvent::slot_transition(kind, binding.slot, synchronized));
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{OutputSlotConfig, SynchronizerConfig, TimelineId};

    fn notifying(timeline_index: usize) -> OutputSlotConfig {
        OutputSlotConfig {
            timeline_index,
            element_index: 0,
            notify_on_change: true,
        }
    }

    fn table() -> BindingTable {
        BindingTable::from_config(&SynchronizerConfig {
            frame_outputs: vec![notifying(0), OutputSlotConfig::default()],
            matrix_outputs: vec![notifying(0), notifying(1)],
            ..Default::default()
        })
    }

    fn inclusion(ids: &[TimelineId]) -> InclusionSet {
        let mut set = InclusionSet::default();
        for &id in ids {
            set.insert(id);
        }
        set
    }

    #[test]
    fn test_edge_triggered() {
        let mut bindings = table();
        let none = BTreeSet::new();
        let included = inclusion(&[TimelineId::frame(0), TimelineId::matrix(0)]);

        let first = slot_transitions(&mut bindings, &included, &none);
        assert_eq!(
            first,
            vec![
                SyncEvent::FrameSlotSynchronized { slot: 0 },
                SyncEvent::MatrixSlotSynchronized { slot: 0 },
            ]
        );

        // Same inclusion: no events
        assert!(slot_transitions(&mut bindings, &included, &none).is_empty());

        let only_matrix = inclusion(&[TimelineId::matrix(0)]);
        assert_eq!(
            slot_transitions(&mut bindings, &only_matrix, &none),
            vec![SyncEvent::FrameSlotUnsynchronized { slot: 0 }]
        );
    }

    #[test]
    fn test_silent_bindings_untouched() {
        let mut bindings = table();
        let included = inclusion(&[TimelineId::frame(0)]);

        slot_transitions(&mut bindings, &included, &BTreeSet::new());

        let silent = bindings.get(TimelineKind::Frame, 1).unwrap();
        assert!(!silent.is_synchronized);
    }

    #[test]
    fn test_unevaluated_matrix_keeps_status() {
        let mut bindings = table();
        let included = inclusion(&[TimelineId::matrix(0), TimelineId::matrix(1)]);
        let unevaluated = BTreeSet::from([1]);

        let events = slot_transitions(&mut bindings, &included, &unevaluated);

        assert_eq!(events, vec![SyncEvent::MatrixSlotSynchronized { slot: 0 }]);
        assert!(!bindings.get(TimelineKind::Matrix, 1).unwrap().is_synchronized);
    }

    #[tokio::test]
    async fn test_bus_prunes_closed() {
        let mut bus = EventBus::default();
        let mut kept = bus.subscribe();
        drop(bus.subscribe());

        bus.emit(SyncEvent::SynchronizationSkipped);

        assert_eq!(bus.len(), 1);
        assert_eq!(kept.recv().await, Some(SyncEvent::SynchronizationSkipped));
    }
}
