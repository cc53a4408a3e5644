//! Main synchronizer implementation.

use std::sync::{Arc, Weak};
use std::time::Duration;

use contracts::{
    FrameTimeline, MatrixTimeline, SharedFrameOutput, SharedMatrixOutput, SyncEvent,
    SynchronizerConfig, TimelineCallback, TimelineId, TimelineKind, TimelineSignal, Timestamp,
};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::attachments::Attachments;
use crate::binding::{BindingTable, OutputBinding};
use crate::delay::DelayTable;
use crate::dispatch::{DispatchMode, DispatchState};
use crate::error::{Result, SyncError};
use crate::notify::{slot_transitions, EventBus};
use crate::selector::select;
use crate::writer::write_round;

/// Result of one synchronization attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncOutcome {
    /// No data arrived since the last round; nothing emitted
    NotReady,
    /// No usable data or no newer instant; `SynchronizationSkipped` emitted
    Skipped,
    /// Outputs updated at this instant; `SynchronizationDone` emitted
    Done(Timestamp),
    /// Request dropped because the timer owns the cadence
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

impl Lifecycle {
    fn name(&self) -> &'static str {
        match self {
            Lifecycle::Idle => "idle",
            Lifecycle::Running => "running",
            Lifecycle::Stopped => "stopped",
        }
    }
}

/// Every piece of mutable state, guarded by one lock
struct SyncState {
    mode: DispatchMode,
    tolerance: Timestamp,
    lifecycle: Lifecycle,
    dispatch: DispatchState,
    bindings: BindingTable,
    delays: DelayTable,
    attachments: Attachments,
    events: EventBus,
}

impl SyncState {
    fn emit(&mut self, event: SyncEvent) {
        trace!(event = event.name(), "emitting sync event");
        self.events.emit(event);
    }

    fn skip(&mut self, reason: &'static str) -> SyncOutcome {
        debug!(reason, "synchronization skipped");
        observability::record_round("skipped");
        self.emit(SyncEvent::SynchronizationSkipped);
        SyncOutcome::Skipped
    }

    fn run_round(&mut self) -> SyncOutcome {
        if !self.dispatch.begin_attempt() {
            trace!("no data since last round");
            observability::record_round("not_ready");
            return SyncOutcome::NotReady;
        }

        let candidates = self.attachments.candidates();
        let Some(selection) = select(&candidates, self.tolerance) else {
            return self.skip("no data");
        };
        if self.dispatch.is_redundant(selection.instant) {
            return self.skip("instant not newer than last synchronization");
        }

        let instant = selection.instant;
        let report = write_round(
            instant,
            &selection.included,
            &self.attachments,
            &self.bindings,
            &self.delays,
        );

        let transitions = slot_transitions(
            &mut self.bindings,
            &selection.included,
            &report.unevaluated_matrix_slots,
        );
        for event in transitions {
            self.emit(event);
        }

        self.dispatch.complete(self.mode, instant);
        self.emit(SyncEvent::SynchronizationDone { timestamp: instant });

        observability::record_round("done");
        observability::record_round_done(
            instant,
            selection.spread(),
            selection.included.len(),
            selection.candidates,
        );
        debug!(
            instant,
            included = selection.included.len(),
            candidates = selection.candidates,
            frames_written = report.frames_written,
            matrices_written = report.matrices_written,
            lookup_misses = report.lookup_misses,
            bindings_version = self.bindings.version(),
            "synchronization done"
        );

        SyncOutcome::Done(instant)
    }
}

struct Inner {
    state: Mutex<SyncState>,
}

impl Inner {
    fn try_synchronize(&self) -> SyncOutcome {
        self.state.lock().run_round()
    }

    fn on_data_arrived(&self) -> Option<SyncOutcome> {
        let mut state = self.state.lock();
        let mode = state.mode;
        if state.dispatch.on_data_arrived(mode) {
            Some(state.run_round())
        } else {
            None
        }
    }

    fn reset(&self) {
        self.state.lock().dispatch.reset();
        debug!("synchronization reset");
    }

    fn on_signal(&self, signal: TimelineSignal) {
        match signal {
            TimelineSignal::Pushed { .. } => {
                self.on_data_arrived();
            }
            TimelineSignal::Cleared => self.reset(),
        }
    }
}

struct TimerTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

fn spawn_timer(runtime: &Handle, inner: Weak<Inner>, period: Duration) -> TimerTask {
    let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();

    let handle = runtime.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    let Some(inner) = inner.upgrade() else { break };
                    inner.try_synchronize();
                }
            }
        }

        debug!("synchronization timer stopped");
    });

    TimerTask { shutdown, handle }
}

/// Multi-timeline synchronizer
///
/// Aligns the newest samples of several frame and matrix timelines on a
/// common instant, writes them to the bound outputs and reports
/// [`SyncEvent`]s to subscribers.
///
/// Output "modified" listeners run while the synchronizer lock is held and
/// must not call back into the synchronizer.
pub struct Synchronizer {
    inner: Arc<Inner>,
    timer: Mutex<Option<TimerTask>>,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Synchronizer")
            .field("mode", &state.mode)
            .field("lifecycle", &state.lifecycle)
            .field("dispatch", &state.dispatch)
            .finish()
    }
}

impl Synchronizer {
    /// Start building a synchronizer from `config`
    pub fn builder(config: SynchronizerConfig) -> SynchronizerBuilder {
        SynchronizerBuilder::new(config)
    }

    /// Subscribe to timeline signals and, in timer mode, start the timer task
    ///
    /// Timer mode must be started from within a tokio runtime.
    #[instrument(name = "synchronizer_start", skip(self))]
    pub fn start(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.lifecycle != Lifecycle::Idle {
            return Err(SyncError::Lifecycle {
                action: "start",
                state: state.lifecycle.name(),
            });
        }

        let timer = match state.mode {
            DispatchMode::Timer { period } => {
                let runtime = Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
                Some((runtime, period))
            }
            DispatchMode::OnRequest => None,
        };

        let weak = Arc::downgrade(&self.inner);
        let callback: TimelineCallback = Arc::new(move |signal| {
            if let Some(inner) = weak.upgrade() {
                inner.on_signal(signal);
            }
        });
        let subscriptions = state.attachments.subscribe_all(callback);
        state.lifecycle = Lifecycle::Running;
        let mode = state.mode;
        drop(state);

        if let Some((runtime, period)) = timer {
            let task = spawn_timer(&runtime, Arc::downgrade(&self.inner), period);
            *self.timer.lock() = Some(task);
        }

        info!(mode = mode.name(), subscriptions, "synchronizer started");
        Ok(())
    }

    /// Stop the timer, wait for an in-flight round, unsubscribe from every
    /// timeline and release the timeline handles
    #[instrument(name = "synchronizer_stop", skip(self))]
    pub async fn stop(&self) {
        let task = self.timer.lock().take();
        if let Some(task) = task {
            let _ = task.shutdown.send(());
            if let Err(e) = task.handle.await {
                warn!(error = %e, "synchronization timer ended abnormally");
            }
        }

        let mut state = self.inner.state.lock();
        if state.lifecycle == Lifecycle::Stopped {
            return;
        }
        state.attachments.release_timelines();
        state.dispatch = DispatchState::default();
        state.lifecycle = Lifecycle::Stopped;
        info!("synchronizer stopped");
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SyncEvent> {
        self.inner.state.lock().events.subscribe()
    }

    /// Forget the last synchronization instant
    pub fn reset(&self) {
        self.inner.reset();
    }

    /// Ask for a round; served immediately if data arrived, otherwise on
    /// the next arrival
    #[instrument(name = "synchronizer_request", skip(self))]
    pub fn request_synchronization(&self) -> SyncOutcome {
        let mut state = self.inner.state.lock();
        if let DispatchMode::Timer { .. } = state.mode {
            warn!("synchronization requests are ignored in timer mode");
            return SyncOutcome::Ignored;
        }
        state.run_round()
    }

    /// Record new data; returns the outcome if a pending request was served
    pub fn on_data_arrived(&self) -> Option<SyncOutcome> {
        self.inner.on_data_arrived()
    }

    /// Run one round now
    #[instrument(name = "synchronizer_try_sync", skip(self))]
    pub fn try_synchronize(&self) -> SyncOutcome {
        self.inner.try_synchronize()
    }

    /// Retarget output `slot` to `element_index` of timeline `timeline_index`
    pub fn set_binding(
        &self,
        kind: TimelineKind,
        timeline_index: usize,
        element_index: usize,
        slot: usize,
    ) -> Result<()> {
        let mut state = self.inner.state.lock();
        if let Err(e) = state
            .bindings
            .set_binding(kind, slot, timeline_index, element_index)
        {
            error!(kind = %kind, slot, error = %e, "set_binding rejected");
            observability::record_config_rejected("set_binding");
            return Err(e);
        }

        let declared = state.delays.declared(kind);
        if timeline_index >= declared {
            warn!(
                timeline = %TimelineId::new(kind, timeline_index),
                slot,
                declared,
                "slot bound to an undeclared timeline, it will never synchronize"
            );
        }
        debug!(kind = %kind, slot, timeline_index, element_index, "binding updated");
        Ok(())
    }

    /// Set the delay (ms) of a timeline; negative values are rejected
    pub fn set_delay(&self, kind: TimelineKind, timeline_index: usize, milliseconds: i64) -> Result<()> {
        let id = TimelineId::new(kind, timeline_index);
        let mut state = self.inner.state.lock();
        match state.delays.set(id, milliseconds) {
            Ok(()) => {
                debug!(timeline = %id, delay = milliseconds, "delay updated");
                Ok(())
            }
            Err(e) => {
                error!(timeline = %id, delay = milliseconds, error = %e, "set_delay rejected");
                observability::record_config_rejected("set_delay");
                Err(e)
            }
        }
    }

    /// Set a delay from a `frameDelay_<i>` / `matrixDelay_<i>` key
    pub fn set_delay_by_key(&self, key: &str, milliseconds: i64) -> Result<()> {
        let id = TimelineId::from_delay_key(key).map_err(|e| {
            warn!(key, "unknown delay key");
            observability::record_config_rejected("set_delay");
            SyncError::InvalidDelayKey(e)
        })?;
        self.set_delay(id.kind, id.index, milliseconds)
    }

    /// Instant of the last successful round since start or reset
    pub fn last_synchronization_timestamp(&self) -> Option<Timestamp> {
        self.inner.state.lock().dispatch.last_synchronization()
    }

    /// Current binding of an output slot
    pub fn binding(&self, kind: TimelineKind, slot: usize) -> Option<OutputBinding> {
        self.inner.state.lock().bindings.get(kind, slot).copied()
    }

    /// Current delay (ms) of a declared timeline
    pub fn delay(&self, kind: TimelineKind, timeline_index: usize) -> Option<u64> {
        self.inner
            .state
            .lock()
            .delays
            .get(TimelineId::new(kind, timeline_index))
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        self.inner.state.lock().mode
    }

    pub fn dispatch_state(&self) -> DispatchState {
        self.inner.state.lock().dispatch
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().lifecycle == Lifecycle::Running
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        if let Some(task) = self.timer.get_mut().take() {
            let _ = task.shutdown.send(());
            task.handle.abort();
        }
        self.inner.state.lock().attachments.unsubscribe_all();
    }
}

/// Builder attaching timelines and outputs in declaration order
pub struct SynchronizerBuilder {
    config: SynchronizerConfig,
    frame_timelines: Vec<Option<Weak<dyn FrameTimeline>>>,
    matrix_timelines: Vec<Option<Weak<dyn MatrixTimeline>>>,
    frame_outputs: Vec<SharedFrameOutput>,
    matrix_outputs: Vec<SharedMatrixOutput>,
}

impl SynchronizerBuilder {
    pub fn new(config: SynchronizerConfig) -> Self {
        Self {
            config,
            frame_timelines: Vec::new(),
            matrix_timelines: Vec::new(),
            frame_outputs: Vec::new(),
            matrix_outputs: Vec::new(),
        }
    }

    /// Attach the next frame timeline (held weakly)
    pub fn frame_timeline<T: FrameTimeline + 'static>(mut self, timeline: &Arc<T>) -> Self {
        let weak: Weak<T> = Arc::downgrade(timeline);
        let weak: Weak<dyn FrameTimeline> = weak;
        self.frame_timelines.push(Some(weak));
        self
    }

    /// Leave the next declared frame timeline absent
    pub fn absent_frame_timeline(mut self) -> Self {
        self.frame_timelines.push(None);
        self
    }

    /// Attach the next matrix timeline (held weakly)
    pub fn matrix_timeline<T: MatrixTimeline + 'static>(mut self, timeline: &Arc<T>) -> Self {
        let weak: Weak<T> = Arc::downgrade(timeline);
        let weak: Weak<dyn MatrixTimeline> = weak;
        self.matrix_timelines.push(Some(weak));
        self
    }

    /// Leave the next declared matrix timeline absent
    pub fn absent_matrix_timeline(mut self) -> Self {
        self.matrix_timelines.push(None);
        self
    }

    /// Destination of the next frame output slot
    pub fn frame_output(mut self, output: SharedFrameOutput) -> Self {
        self.frame_outputs.push(output);
        self
    }

    /// Destination of the next matrix output slot
    pub fn matrix_output(mut self, output: SharedMatrixOutput) -> Self {
        self.matrix_outputs.push(output);
        self
    }

    pub fn build(self) -> Result<Synchronizer> {
        let Self {
            config,
            mut frame_timelines,
            mut matrix_timelines,
            frame_outputs,
            matrix_outputs,
        } = self;

        check_count(TimelineKind::Frame, "timelines", frame_timelines.len(), config.frame_timelines.len(), true)?;
        check_count(TimelineKind::Matrix, "timelines", matrix_timelines.len(), config.matrix_timelines.len(), true)?;
        check_count(TimelineKind::Frame, "outputs", frame_outputs.len(), config.frame_outputs.len(), false)?;
        check_count(TimelineKind::Matrix, "outputs", matrix_outputs.len(), config.matrix_outputs.len(), false)?;

        frame_timelines.resize_with(config.frame_timelines.len(), || None);
        matrix_timelines.resize_with(config.matrix_timelines.len(), || None);

        for kind in [TimelineKind::Frame, TimelineKind::Matrix] {
            let declared = config.timelines(kind).len();
            for (slot, output) in config.outputs(kind).iter().enumerate() {
                if output.timeline_index >= declared {
                    warn!(
                        kind = %kind,
                        slot,
                        timeline_index = output.timeline_index,
                        declared,
                        "output slot bound to an undeclared timeline"
                    );
                }
            }
        }

        let mode = DispatchMode::from_config(&config);
        let state = SyncState {
            mode,
            tolerance: config.tolerance,
            lifecycle: Lifecycle::Idle,
            dispatch: DispatchState::default(),
            bindings: BindingTable::from_config(&config),
            delays: DelayTable::from_config(&config),
            attachments: Attachments::new(
                &config,
                frame_timelines,
                matrix_timelines,
                frame_outputs,
                matrix_outputs,
            ),
            events: EventBus::default(),
        };

        info!(
            mode = mode.name(),
            tolerance = config.tolerance,
            frame_timelines = config.frame_timelines.len(),
            matrix_timelines = config.matrix_timelines.len(),
            frame_outputs = config.frame_outputs.len(),
            matrix_outputs = config.matrix_outputs.len(),
            "synchronizer built"
        );

        Ok(Synchronizer {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
            }),
            timer: Mutex::new(None),
        })
    }
}

/// Timelines may be fewer than declared (the rest stay absent); outputs
/// must match exactly
fn check_count(
    kind: TimelineKind,
    what: &'static str,
    attached: usize,
    declared: usize,
    allow_fewer: bool,
) -> Result<()> {
    let ok = if allow_fewer {
        attached <= declared
    } else {
        attached == declared
    };
    if ok {
        Ok(())
    } else {
        Err(SyncError::AttachmentMismatch {
            kind,
            what,
            attached,
            declared,
        })
    }
}
