//! Mock 时间线生产者
//!
//! 按固定频率向内存时间线推送合成数据，用于测试和 CLI 演示。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{FrameTimeline, Timestamp};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::{FrameTimelineBuffer, MatrixTimelineBuffer};

/// 进程内时钟，时间戳为自创建以来的毫秒数
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    start: Instant,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// 当前时间 (ms)
    pub fn now_ms(&self) -> Timestamp {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

/// Mock 生产者配置
#[derive(Debug, Clone)]
pub struct MockProducerConfig {
    /// 推送频率 (Hz)
    pub frequency_hz: f64,

    /// 时间戳滞后 (ms)，模拟采集延迟
    pub lag_ms: f64,

    /// 每个缓冲区填充的元素索引
    pub elements: Vec<usize>,
}

impl Default for MockProducerConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 30.0,
            lag_ms: 0.0,
            elements: vec![0],
        }
    }
}

enum Target {
    Frame(Arc<FrameTimelineBuffer>),
    Matrix(Arc<MatrixTimelineBuffer>),
}

impl Target {
    fn name(&self) -> &str {
        match self {
            Target::Frame(timeline) => timeline.name(),
            Target::Matrix(timeline) => timeline.name(),
        }
    }

    fn push_sample(&self, timestamp: Timestamp, sequence: u64, elements: &[usize]) {
        match self {
            Target::Frame(timeline) => {
                let size = timeline.geometry().element_size();
                let mut buffer = timeline.create_buffer(timestamp);
                for &index in elements {
                    let data = Bytes::from(vec![(sequence % 256) as u8; size]);
                    if let Err(e) = timeline.set_element(&mut buffer, index, data) {
                        warn!(timeline = %timeline.name(), error = %e, "mock frame element skipped");
                    }
                }
                timeline.push(buffer);
            }
            Target::Matrix(timeline) => {
                let mut buffer = timeline.create_buffer(timestamp);
                for &index in elements {
                    if let Err(e) =
                        timeline.set_element(&mut buffer, index, translation(sequence, index))
                    {
                        warn!(timeline = %timeline.name(), error = %e, "mock matrix element skipped");
                    }
                }
                timeline.push(buffer);
            }
        }
    }
}

/// Translation along x by `sequence`, along y by `element`
fn translation(sequence: u64, element: usize) -> [f32; 16] {
    [
        1.0, 0.0, 0.0, sequence as f32, //
        0.0, 1.0, 0.0, element as f32, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

/// Mock 时间线生产者
///
/// 在 tokio 任务中运行，`stop()` 后任务在下一次唤醒时退出。
pub struct MockProducer {
    config: MockProducerConfig,
    target: Arc<Target>,
    running: Arc<AtomicBool>,
}

impl MockProducer {
    /// 创建帧生产者
    pub fn frames(timeline: Arc<FrameTimelineBuffer>, config: MockProducerConfig) -> Self {
        Self::new(Target::Frame(timeline), config)
    }

    /// 创建矩阵生产者
    pub fn matrices(timeline: Arc<MatrixTimelineBuffer>, config: MockProducerConfig) -> Self {
        Self::new(Target::Matrix(timeline), config)
    }

    fn new(target: Target, config: MockProducerConfig) -> Self {
        Self {
            config,
            target: Arc::new(target),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 启动生产者，返回任务句柄
    ///
    /// 必须在 tokio runtime 中调用。
    pub fn start(&self, clock: SessionClock) -> JoinHandle<u64> {
        let config = self.config.clone();
        let target = self.target.clone();
        let running = self.running.clone();

        running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let frequency_hz = if config.frequency_hz > 0.0 {
                config.frequency_hz
            } else {
                warn!(
                    timeline = %target.name(),
                    frequency_hz = config.frequency_hz,
                    "non-positive frequency, falling back to 1 Hz"
                );
                1.0
            };
            let interval = Duration::from_secs_f64(1.0 / frequency_hz);
            let mut sequence: u64 = 0;

            debug!(
                timeline = %target.name(),
                frequency_hz,
                lag_ms = config.lag_ms,
                "mock producer started"
            );

            while running.load(Ordering::Relaxed) {
                let timestamp = clock.now_ms() - config.lag_ms;
                sequence += 1;

                target.push_sample(timestamp, sequence, &config.elements);
                trace!(timeline = %target.name(), sequence, timestamp, "mock sample pushed");

                tokio::time::sleep(interval).await;
            }

            debug!(timeline = %target.name(), pushed = sequence, "mock producer stopped");
            sequence
        })
    }

    /// 停止生产者
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// 检查是否正在运行
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}
