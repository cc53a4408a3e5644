//! 同步器指标收集模块
//!
//! 记录同步轮次、查找失败与槽位状态变化，并基于 `SyncEvent` 在内存中聚合统计。

use std::collections::BTreeMap;

use contracts::{SyncEvent, TimelineKind, Timestamp};
use metrics::{counter, gauge, histogram};

/// 记录一次同步轮次的结果
///
/// `outcome` 取值: `done` / `skipped` / `not_ready`
pub fn record_round(outcome: &'static str) {
    counter!("timeline_sync_rounds_total", "outcome" => outcome).increment(1);
}

/// 记录成功轮次的细节
///
/// # Arguments
/// * `instant` - 本轮同步时刻 (ms)
/// * `spread_ms` - 纳入时间线中最新与最旧时间戳之差
/// * `included` - 纳入的时间线数量
/// * `candidates` - 有数据的时间线数量
pub fn record_round_done(instant: Timestamp, spread_ms: f64, included: usize, candidates: usize) {
    gauge!("timeline_sync_last_instant_ms").set(instant);
    histogram!("timeline_sync_round_spread_ms").record(spread_ms);
    gauge!("timeline_sync_included_timelines").set(included as f64);

    if candidates > 0 {
        histogram!("timeline_sync_inclusion_ratio").record(included as f64 / candidates as f64);
    }
}

/// 记录时间线查找失败
pub fn record_lookup_miss(timeline: &str) {
    counter!(
        "timeline_sync_lookup_miss_total",
        "timeline" => timeline.to_string()
    )
    .increment(1);
}

/// 记录槽位同步状态变化
pub fn record_slot_transition(kind: TimelineKind, slot: usize, synchronized: bool) {
    let state = if synchronized {
        "synchronized"
    } else {
        "unsynchronized"
    };
    counter!(
        "timeline_sync_slot_transitions_total",
        "kind" => kind.as_str(),
        "slot" => slot.to_string(),
        "state" => state
    )
    .increment(1);
}

/// 记录被拒绝的运行时配置调用
pub fn record_config_rejected(operation: &'static str) {
    counter!("timeline_sync_config_rejected_total", "operation" => operation).increment(1);
}

/// 同步事件聚合器
///
/// 在内存中聚合事件，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SyncMetricsAggregator {
    /// 成功轮次
    pub rounds_done: u64,

    /// 跳过轮次
    pub rounds_skipped: u64,

    /// 各槽位进入同步状态次数 (key: `frame0` / `matrix1`)
    pub slot_synchronized: BTreeMap<String, u64>,

    /// 各槽位离开同步状态次数
    pub slot_unsynchronized: BTreeMap<String, u64>,

    /// 相邻同步时刻间隔 (ms)
    pub intervals: InstantIntervals,
}

impl SyncMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, event: &SyncEvent) {
        match *event {
            SyncEvent::SynchronizationDone { timestamp } => {
                self.rounds_done += 1;
                self.intervals.record(timestamp);
            }
            SyncEvent::SynchronizationSkipped => {
                self.rounds_skipped += 1;
            }
            SyncEvent::FrameSlotSynchronized { slot } => {
                *self.slot_synchronized.entry(format!("frame{slot}")).or_insert(0) += 1;
            }
            SyncEvent::FrameSlotUnsynchronized { slot } => {
                *self
                    .slot_unsynchronized
                    .entry(format!("frame{slot}"))
                    .or_insert(0) += 1;
            }
            SyncEvent::MatrixSlotSynchronized { slot } => {
                *self
                    .slot_synchronized
                    .entry(format!("matrix{slot}"))
                    .or_insert(0) += 1;
            }
            SyncEvent::MatrixSlotUnsynchronized { slot } => {
                *self
                    .slot_unsynchronized
                    .entry(format!("matrix{slot}"))
                    .or_insert(0) += 1;
            }
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let total_rounds = self.rounds_done + self.rounds_skipped;
        MetricsSummary {
            total_rounds,
            rounds_done: self.rounds_done,
            rounds_skipped: self.rounds_skipped,
            skip_rate: if total_rounds > 0 {
                self.rounds_skipped as f64 / total_rounds as f64 * 100.0
            } else {
                0.0
            },
            last_instant: self.intervals.last_instant(),
            instant_interval_ms: IntervalSummary::from(&self.intervals),
            slot_synchronized: self.slot_synchronized.clone(),
            slot_unsynchronized: self.slot_unsynchronized.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_rounds: u64,
    pub rounds_done: u64,
    pub rounds_skipped: u64,
    pub skip_rate: f64,
    pub last_instant: Option<Timestamp>,
    pub instant_interval_ms: IntervalSummary,
    pub slot_synchronized: BTreeMap<String, u64>,
    pub slot_unsynchronized: BTreeMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Sync Metrics Summary ===")?;
        writeln!(f, "Total rounds: {}", self.total_rounds)?;
        writeln!(f, "Synchronized: {}", self.rounds_done)?;
        writeln!(
            f,
            "Skipped: {} ({:.2}%)",
            self.rounds_skipped, self.skip_rate
        )?;
        match self.last_instant {
            Some(instant) => writeln!(f, "Last instant (ms): {:.3}", instant)?,
            None => writeln!(f, "Last instant (ms): N/A")?,
        }
        writeln!(f, "Instant interval (ms): {}", self.instant_interval_ms)?;

        if !self.slot_synchronized.is_empty() || !self.slot_unsynchronized.is_empty() {
            writeln!(f, "Slot transitions (synced / unsynced):")?;
            let slots: std::collections::BTreeSet<&String> = self
                .slot_synchronized
                .keys()
                .chain(self.slot_unsynchronized.keys())
                .collect();
            for slot in slots {
                writeln!(
                    f,
                    "  {}: {} / {}",
                    slot,
                    self.slot_synchronized.get(slot).copied().unwrap_or(0),
                    self.slot_unsynchronized.get(slot).copied().unwrap_or(0)
                )?;
            }
        }

        Ok(())
    }
}

/// 同步时刻间隔摘要 (ms)
#[derive(Debug, Clone, Default)]
pub struct IntervalSummary {
    pub count: u64,
    pub shortest: f64,
    pub longest: f64,
    pub mean: f64,
    pub jitter: f64,
}

impl From<&InstantIntervals> for IntervalSummary {
    fn from(intervals: &InstantIntervals) -> Self {
        Self {
            count: intervals.count,
            shortest: intervals.shortest,
            longest: intervals.longest,
            mean: intervals.mean(),
            jitter: intervals.jitter(),
        }
    }
}

impl std::fmt::Display for IntervalSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "shortest={:.3}, longest={:.3}, mean={:.3}, jitter={:.3} (n={})",
            self.shortest, self.longest, self.mean, self.jitter, self.count
        )
    }
}

/// 相邻成功同步时刻之间的间隔
///
/// 每个 `SynchronizationDone` 时刻调用一次 [`InstantIntervals::record`]。
/// 均值与方差按 Welford 在线更新；同步时刻严格递增，因此间隔恒为正。
#[derive(Debug, Clone, Default)]
pub struct InstantIntervals {
    last_instant: Option<Timestamp>,
    count: u64,
    mean: f64,
    m2: f64,
    shortest: f64,
    longest: f64,
}

impl InstantIntervals {
    /// 记录一次同步时刻，第一次调用只建立基准
    pub fn record(&mut self, instant: Timestamp) {
        let Some(previous) = self.last_instant.replace(instant) else {
            return;
        };
        let gap = instant - previous;

        self.count += 1;
        if self.count == 1 {
            self.shortest = gap;
            self.longest = gap;
        } else {
            self.shortest = self.shortest.min(gap);
            self.longest = self.longest.max(gap);
        }

        let delta = gap - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (gap - self.mean);
    }

    /// 最近一次同步时刻
    pub fn last_instant(&self) -> Option<Timestamp> {
        self.last_instant
    }

    /// 已记录的间隔数 (时刻数 - 1)
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// 间隔的样本标准差
    pub fn jitter(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }

    pub fn shortest(&self) -> f64 {
        self.shortest
    }

    pub fn longest(&self) -> f64 {
        self.longest
    }
}
