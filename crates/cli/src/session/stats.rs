//! Session statistics and metrics.

use std::time::Duration;

use observability::SyncMetricsAggregator;
use timeline::TimelineMetricsSnapshot;

/// Per-timeline counters at the end of a session
#[derive(Debug, Clone)]
pub struct TimelineReport {
    pub name: String,
    pub metrics: TimelineMetricsSnapshot,
}

/// Statistics from a session run
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Successful synchronization rounds observed
    pub rounds_done: u64,

    /// Synchronization requests issued (on-request mode)
    pub requests: u64,

    /// Samples pushed by the mock producers
    pub samples_pushed: u64,

    /// "modified" notifications raised by the outputs
    pub outputs_modified: u64,

    /// Total duration of the session
    pub duration: Duration,

    /// Number of timelines fed by a producer
    pub active_timelines: usize,

    /// Number of output slots
    pub active_outputs: usize,

    /// Timeline counters
    pub timelines: Vec<TimelineReport>,

    /// Sync event aggregator
    pub sync_metrics: SyncMetricsAggregator,
}

impl SessionStats {
    /// Successful rounds per second
    pub fn rounds_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.rounds_done as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Session Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Rounds done: {}", self.rounds_done);
        println!("   ├─ Requests: {}", self.requests);
        println!("   ├─ Rounds/s: {:.2}", self.rounds_per_sec());
        println!("   ├─ Samples pushed: {}", self.samples_pushed);
        println!("   ├─ Output notifications: {}", self.outputs_modified);
        println!("   ├─ Active timelines: {}", self.active_timelines);
        println!("   └─ Output slots: {}", self.active_outputs);

        if !self.timelines.is_empty() {
            println!("\nTimelines");
            for (i, report) in self.timelines.iter().enumerate() {
                let prefix = if i == self.timelines.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: pushed {}, evicted {}, out of order {}",
                    prefix,
                    report.name,
                    report.metrics.buffers_pushed,
                    report.metrics.buffers_evicted,
                    report.metrics.out_of_order
                );
            }
        }

        println!("\n{}", self.sync_metrics.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_per_sec() {
        let stats = SessionStats {
            rounds_done: 50,
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(stats.rounds_per_sec(), 25.0);
        assert_eq!(SessionStats::default().rounds_per_sec(), 0.0);
    }
}
