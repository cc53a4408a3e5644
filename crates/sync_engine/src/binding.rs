//! Output slot bindings.

use contracts::{OutputSlotConfig, SynchronizerConfig, TimelineKind};

use crate::error::{Result, SyncError};

/// Binding of one output slot to a timeline element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputBinding {
    pub slot: usize,
    pub timeline_index: usize,
    pub element_index: usize,
    pub notify_on_change: bool,
    /// Timeline was part of the last successful round
    pub is_synchronized: bool,
}

impl OutputBinding {
    fn from_config(slot: usize, config: &OutputSlotConfig) -> Self {
        Self {
            slot,
            timeline_index: config.timeline_index,
            element_index: config.element_index,
            notify_on_change: config.notify_on_change,
            is_synchronized: false,
        }
    }
}

/// Frame and matrix bindings, versioned on every retarget
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    frames: Vec<OutputBinding>,
    matrices: Vec<OutputBinding>,
    version: u64,
}

impl BindingTable {
    pub fn from_config(config: &SynchronizerConfig) -> Self {
        let build = |slots: &[OutputSlotConfig]| -> Vec<OutputBinding> {
            slots
                .iter()
                .enumerate()
                .map(|(slot, cfg)| OutputBinding::from_config(slot, cfg))
                .collect()
        };

        Self {
            frames: build(&config.frame_outputs),
            matrices: build(&config.matrix_outputs),
            version: 0,
        }
    }

    #[inline]
    pub fn bindings(&self, kind: TimelineKind) -> &[OutputBinding] {
        match kind {
            TimelineKind::Frame => &self.frames,
            TimelineKind::Matrix => &self.matrices,
        }
    }

    #[inline]
    pub(crate) fn bindings_mut(&mut self, kind: TimelineKind) -> &mut [OutputBinding] {
        match kind {
            TimelineKind::Frame => &mut self.frames,
            TimelineKind::Matrix => &mut self.matrices,
        }
    }

    pub fn get(&self, kind: TimelineKind, slot: usize) -> Option<&OutputBinding> {
        self.bindings(kind).get(slot)
    }

    /// Bindings fed by timeline `timeline_index`
    pub fn targeting(
        &self,
        kind: TimelineKind,
        timeline_index: usize,
    ) -> impl Iterator<Item = &OutputBinding> {
        self.bindings(kind)
            .iter()
            .filter(move |b| b.timeline_index == timeline_index)
    }

    /// Retarget a slot in place, keeping its notification state
    pub fn set_binding(
        &mut self,
        kind: TimelineKind,
        slot: usize,
        timeline_index: usize,
        element_index: usize,
    ) -> Result<()> {
        let declared = self.bindings(kind).len();
        let binding = self
            .bindings_mut(kind)
            .get_mut(slot)
            .ok_or(SyncError::UnknownSlot {
                kind,
                slot,
                declared,
            })?;

        binding.timeline_index = timeline_index;
        binding.element_index = element_index;
        self.version += 1;
        Ok(())
    }

    /// Incremented by every successful [`BindingTable::set_binding`]
    pub fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> BindingTable {
        let config = SynchronizerConfig {
            frame_outputs: vec![OutputSlotConfig {
                timeline_index: 1,
                element_index: 0,
                notify_on_change: true,
            }],
            matrix_outputs: vec![OutputSlotConfig::default(), OutputSlotConfig::default()],
            ..Default::default()
        };
        BindingTable::from_config(&config)
    }

    #[test]
    fn test_from_config() {
        let table = table();
        let frame = table.get(TimelineKind::Frame, 0).unwrap();

        assert_eq!(frame.timeline_index, 1);
        assert!(frame.notify_on_change);
        assert!(!frame.is_synchronized);
        assert_eq!(table.bindings(TimelineKind::Matrix).len(), 2);
    }

    #[test]
    fn test_set_binding_retargets() {
        let mut table = table();
        table.set_binding(TimelineKind::Matrix, 1, 3, 2).unwrap();

        let binding = table.get(TimelineKind::Matrix, 1).unwrap();
        assert_eq!((binding.timeline_index, binding.element_index), (3, 2));
        assert_eq!(table.version(), 1);
        assert_eq!(table.targeting(TimelineKind::Matrix, 3).count(), 1);
        assert_eq!(table.targeting(TimelineKind::Matrix, 0).count(), 1);
    }

    #[test]
    fn test_set_binding_unknown_slot() {
        let mut table = table();
        let result = table.set_binding(TimelineKind::Frame, 5, 0, 0);

        assert!(matches!(
            result,
            Err(SyncError::UnknownSlot {
                slot: 5,
                declared: 1,
                ..
            })
        ));
        assert_eq!(table.version(), 0);
    }
}
