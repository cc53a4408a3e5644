//! Dispatch modes and the request/arrival state machine.

use std::time::Duration;

use contracts::{SynchronizerConfig, Timestamp};

/// When rounds are triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// A round runs when requested and data has arrived since the last one
    OnRequest,
    /// A periodic tick runs a round
    Timer { period: Duration },
}

impl DispatchMode {
    pub fn from_config(config: &SynchronizerConfig) -> Self {
        if config.legacy_auto_sync {
            DispatchMode::Timer {
                period: Duration::from_millis(config.timer_period.max(1)),
            }
        } else {
            DispatchMode::OnRequest
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DispatchMode::OnRequest => "on_request",
            DispatchMode::Timer { .. } => "timer",
        }
    }
}

/// Dispatch bits and the last emitted instant
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DispatchState {
    last_synchronization: Option<Timestamp>,
    object_received: bool,
    sync_requested: bool,
}

impl DispatchState {
    #[inline]
    pub fn last_synchronization(&self) -> Option<Timestamp> {
        self.last_synchronization
    }

    #[inline]
    pub fn object_received(&self) -> bool {
        self.object_received
    }

    #[inline]
    pub fn sync_requested(&self) -> bool {
        self.sync_requested
    }

    /// Forget the last instant; the bits are left untouched
    pub fn reset(&mut self) {
        self.last_synchronization = None;
    }

    /// Record an arrival; returns `true` when a pending request should run now
    pub fn on_data_arrived(&mut self, mode: DispatchMode) -> bool {
        self.object_received = true;
        matches!(mode, DispatchMode::OnRequest) && self.sync_requested
    }

    /// Start an attempt; returns `false` when no data arrived yet
    pub fn begin_attempt(&mut self) -> bool {
        self.sync_requested = true;
        self.object_received
    }

    /// `instant` would not move the synchronization forward
    #[inline]
    pub fn is_redundant(&self, instant: Timestamp) -> bool {
        self.last_synchronization
            .is_some_and(|last| instant <= last)
    }

    /// Close a successful round
    pub fn complete(&mut self, mode: DispatchMode, instant: Timestamp) {
        self.last_synchronization = Some(instant);
        self.sync_requested = false;
        if matches!(mode, DispatchMode::OnRequest) {
            self.object_received = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMER: DispatchMode = DispatchMode::Timer {
        period: Duration::from_millis(15),
    };

    #[test]
    fn test_mode_from_config() {
        let mut config = SynchronizerConfig::default();
        assert_eq!(DispatchMode::from_config(&config), DispatchMode::OnRequest);

        config.legacy_auto_sync = true;
        config.timer_period = 40;
        assert_eq!(
            DispatchMode::from_config(&config),
            DispatchMode::Timer {
                period: Duration::from_millis(40)
            }
        );
    }

    #[test]
    fn test_attempt_without_data() {
        let mut state = DispatchState::default();

        assert!(!state.begin_attempt());
        assert!(state.sync_requested());
        assert!(!state.object_received());
    }

    #[test]
    fn test_pending_request_served_on_arrival() {
        let mut state = DispatchState::default();
        state.begin_attempt();

        assert!(state.on_data_arrived(DispatchMode::OnRequest));
        assert!(state.begin_attempt());
    }

    #[test]
    fn test_timer_arrival_never_triggers() {
        let mut state = DispatchState::default();
        state.begin_attempt();
        assert!(!state.on_data_arrived(TIMER));
    }

    #[test]
    fn test_complete_clears_bits() {
        let mut on_request = DispatchState::default();
        on_request.on_data_arrived(DispatchMode::OnRequest);
        on_request.begin_attempt();
        on_request.complete(DispatchMode::OnRequest, 10.0);
        assert!(!on_request.object_received());
        assert!(!on_request.sync_requested());

        let mut timer = DispatchState::default();
        timer.on_data_arrived(TIMER);
        timer.begin_attempt();
        timer.complete(TIMER, 10.0);
        assert!(timer.object_received());
        assert!(!timer.sync_requested());
        assert_eq!(timer.last_synchronization(), Some(10.0));
    }

    #[test]
    fn test_redundant_and_reset() {
        let mut state = DispatchState::default();
        assert!(!state.is_redundant(5.0));

        state.complete(DispatchMode::OnRequest, 10.0);
        assert!(state.is_redundant(10.0));
        assert!(state.is_redundant(9.0));
        assert!(!state.is_redundant(11.0));

        state.reset();
        assert!(!state.is_redundant(9.0));
    }
}
