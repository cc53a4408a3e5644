//! Session orchestrator - wires mock producers, timelines, the synchronizer
//! and its outputs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{
    ImageSeries, SessionBlueprint, SourceConfig, SyncEvent, TimelineId, TransformMatrix,
};
use parking_lot::Mutex;
use sync_engine::{DispatchMode, Synchronizer};
use timeline::{
    FrameTimelineBuffer, MatrixTimelineBuffer, MockProducer, MockProducerConfig, SessionClock,
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::stats::{SessionStats, TimelineReport};
use crate::error::CliError;

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The session blueprint
    pub blueprint: SessionBlueprint,

    /// Maximum number of successful rounds (None = unlimited)
    pub max_rounds: Option<u64>,

    /// Session timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Interval between synchronization requests in on-request mode
    pub request_interval: Duration,
}

/// In-memory timelines and the producers feeding them
struct Sources {
    frames: Vec<Arc<FrameTimelineBuffer>>,
    matrices: Vec<Arc<MatrixTimelineBuffer>>,
    producers: Vec<MockProducer>,
}

impl Sources {
    fn from_blueprint(blueprint: &SessionBlueprint) -> Result<Self> {
        let sync = &blueprint.synchronizer;
        let mut sources = Sources {
            frames: Vec::new(),
            matrices: Vec::new(),
            producers: Vec::new(),
        };

        for (index, source) in blueprint.frame_sources.iter().enumerate() {
            let label = sync.timeline_label(TimelineId::frame(index));
            let timeline = FrameTimelineBuffer::shared(
                &label,
                source.source.capacity,
                source.geometry(),
                source.source.elements,
            )
            .map_err(|e| CliError::session_setup(e.to_string()))?;

            sources.producers.push(MockProducer::frames(
                timeline.clone(),
                producer_config(&source.source),
            ));
            sources.frames.push(timeline);
        }

        for (index, source) in blueprint.matrix_sources.iter().enumerate() {
            let label = sync.timeline_label(TimelineId::matrix(index));
            let timeline =
                MatrixTimelineBuffer::shared(&label, source.source.capacity, source.source.elements)
                    .map_err(|e| CliError::session_setup(e.to_string()))?;

            sources.producers.push(MockProducer::matrices(
                timeline.clone(),
                producer_config(&source.source),
            ));
            sources.matrices.push(timeline);
        }

        Ok(sources)
    }

    fn reports(&self) -> Vec<TimelineReport> {
        let frames = self.frames.iter().map(|t| TimelineReport {
            name: t.name().to_string(),
            metrics: t.metrics(),
        });
        let matrices = self.matrices.iter().map(|t| TimelineReport {
            name: t.name().to_string(),
            metrics: t.metrics(),
        });
        frames.chain(matrices).collect()
    }
}

fn producer_config(source: &SourceConfig) -> MockProducerConfig {
    MockProducerConfig {
        frequency_hz: source.frequency_hz,
        lag_ms: source.lag_ms,
        elements: (0..source.elements).collect(),
    }
}

/// Output containers, one per declared slot
struct Outputs {
    frames: Vec<Arc<Mutex<ImageSeries>>>,
    matrices: Vec<Arc<Mutex<TransformMatrix>>>,
}

impl Outputs {
    fn from_blueprint(blueprint: &SessionBlueprint) -> Self {
        let sync = &blueprint.synchronizer;
        Self {
            frames: sync.frame_outputs.iter().map(|_| ImageSeries::shared()).collect(),
            matrices: sync
                .matrix_outputs
                .iter()
                .map(|_| TransformMatrix::shared())
                .collect(),
        }
    }

    fn len(&self) -> usize {
        self.frames.len() + self.matrices.len()
    }

    fn modified_count(&self) -> u64 {
        let frames: u64 = self.frames.iter().map(|o| o.lock().image().modified_count()).sum();
        let matrices: u64 = self.matrices.iter().map(|o| o.lock().modified_count()).sum();
        frames + matrices
    }
}

/// Main session orchestrator
pub struct Session {
    config: SessionConfig,
}

impl Session {
    /// Create a new session with the given configuration
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Run the session to completion
    pub async fn run(self) -> Result<SessionStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Timelines + producers
        let sources = Sources::from_blueprint(blueprint)?;
        let outputs = Outputs::from_blueprint(blueprint);

        info!(
            frame_timelines = sources.frames.len(),
            matrix_timelines = sources.matrices.len(),
            outputs = outputs.len(),
            "Timelines and outputs created"
        );

        // Synchronizer
        let mut builder = Synchronizer::builder(blueprint.synchronizer.clone());
        for timeline in &sources.frames {
            builder = builder.frame_timeline(timeline);
        }
        for timeline in &sources.matrices {
            builder = builder.matrix_timeline(timeline);
        }
        for output in &outputs.frames {
            builder = builder.frame_output(output.clone());
        }
        for output in &outputs.matrices {
            builder = builder.matrix_output(output.clone());
        }
        let synchronizer = builder.build().context("Failed to build synchronizer")?;
        let mut events = synchronizer.subscribe();
        synchronizer
            .start()
            .context("Failed to start synchronizer")?;

        // Start producers
        let clock = SessionClock::new();
        let handles: Vec<_> = sources.producers.iter().map(|p| p.start(clock)).collect();

        let mode = synchronizer.dispatch_mode();
        let on_request = matches!(mode, DispatchMode::OnRequest);
        let max_rounds = self.config.max_rounds;
        let mut request_ticker = tokio::time::interval(self.config.request_interval);
        request_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut stats = SessionStats {
            active_timelines: sources.producers.len(),
            active_outputs: outputs.len(),
            ..Default::default()
        };

        info!(mode = mode.name(), max_rounds = ?max_rounds, "Session running");

        let session_loop = async {
            loop {
                tokio::select! {
                    event = events.recv() => {
                        let Some(event) = event else {
                            warn!("Event channel closed");
                            break;
                        };
                        stats.sync_metrics.update(&event);
                        log_event(&event);

                        if let SyncEvent::SynchronizationDone { .. } = event {
                            stats.rounds_done += 1;
                            if max_rounds.is_some_and(|max| stats.rounds_done >= max) {
                                info!(rounds = stats.rounds_done, "Reached max rounds limit");
                                break;
                            }
                        }
                    }
                    _ = request_ticker.tick(), if on_request => {
                        stats.requests += 1;
                        synchronizer.request_synchronization();
                    }
                }
            }
        };

        // Run with optional timeout
        if let Some(timeout) = self.config.timeout {
            if tokio::time::timeout(timeout, session_loop).await.is_err() {
                warn!(timeout_secs = timeout.as_secs(), "Session timed out");
            }
        } else {
            session_loop.await;
        }

        // Shutdown
        info!("Shutting down session...");
        for producer in &sources.producers {
            producer.stop();
        }
        for handle in handles {
            match tokio::time::timeout(Duration::from_secs(2), handle).await {
                Ok(Ok(pushed)) => stats.samples_pushed += pushed,
                Ok(Err(e)) => warn!(error = %e, "Producer task failed"),
                Err(_) => warn!("Producer task did not stop in time"),
            }
        }
        synchronizer.stop().await;

        stats.outputs_modified = outputs.modified_count();
        stats.timelines = sources.reports();
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            rounds_per_sec = format!("{:.2}", stats.rounds_per_sec()),
            "Session shutdown complete"
        );

        Ok(stats)
    }
}

fn log_event(event: &SyncEvent) {
    match event {
        SyncEvent::SynchronizationDone { timestamp } => {
            debug!(timestamp = format!("{timestamp:.3}"), "Synchronization done");
        }
        SyncEvent::SynchronizationSkipped => debug!("Synchronization skipped"),
        SyncEvent::FrameSlotSynchronized { slot } => info!(slot, "Frame slot synchronized"),
        SyncEvent::FrameSlotUnsynchronized { slot } => info!(slot, "Frame slot lost synchronization"),
        SyncEvent::MatrixSlotSynchronized { slot } => info!(slot, "Matrix slot synchronized"),
        SyncEvent::MatrixSlotUnsynchronized { slot } => {
            info!(slot, "Matrix slot lost synchronization")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        FrameSourceConfig, MatrixSourceConfig, OutputSlotConfig, SynchronizerConfig,
        TimelineConfig,
    };

    fn blueprint(legacy_auto_sync: bool) -> SessionBlueprint {
        let fast = SourceConfig {
            frequency_hz: 200.0,
            ..Default::default()
        };
        SessionBlueprint {
            synchronizer: SynchronizerConfig {
                legacy_auto_sync,
                timer_period: 5,
                frame_timelines: vec![TimelineConfig::default()],
                matrix_timelines: vec![TimelineConfig::default()],
                frame_outputs: vec![OutputSlotConfig::default()],
                matrix_outputs: vec![OutputSlotConfig::default()],
                ..Default::default()
            },
            frame_sources: vec![FrameSourceConfig {
                source: fast.clone(),
                width: 4,
                height: 4,
                ..Default::default()
            }],
            matrix_sources: vec![MatrixSourceConfig { source: fast }],
            ..Default::default()
        }
    }

    fn config(legacy_auto_sync: bool) -> SessionConfig {
        SessionConfig {
            blueprint: blueprint(legacy_auto_sync),
            max_rounds: Some(3),
            timeout: Some(Duration::from_secs(5)),
            metrics_port: None,
            request_interval: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_on_request_session_reaches_max_rounds() {
        let stats = Session::new(config(false)).run().await.unwrap();

        assert_eq!(stats.rounds_done, 3);
        assert!(stats.requests >= 1);
        assert!(stats.outputs_modified >= 1);
        assert_eq!(stats.active_timelines, 2);
        assert_eq!(stats.timelines.len(), 2);
    }

    #[tokio::test]
    async fn test_timer_session_reaches_max_rounds() {
        let stats = Session::new(config(true)).run().await.unwrap();

        assert_eq!(stats.rounds_done, 3);
        assert_eq!(stats.requests, 0);
        assert_eq!(stats.sync_metrics.rounds_done, 3);
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_stats() {
        let mut config = config(false);
        config.blueprint.frame_sources.clear();
        config.blueprint.matrix_sources.clear();
        config.max_rounds = None;
        config.timeout = Some(Duration::from_millis(50));

        let stats = Session::new(config).run().await.unwrap();

        assert_eq!(stats.rounds_done, 0);
        assert_eq!(stats.samples_pushed, 0);
        assert!(stats.requests >= 1);
    }
}
