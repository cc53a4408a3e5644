//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{SessionBlueprint, TimelineId, TimelineKind};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    synchronizer: SynchronizerInfo,
    timelines: Vec<TimelineInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    outputs: Vec<OutputInfo>,
}

#[derive(Serialize)]
struct SynchronizerInfo {
    tolerance_ms: f64,
    dispatch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    timer_period_ms: Option<u64>,
}

#[derive(Serialize)]
struct TimelineInfo {
    id: String,
    name: String,
    delay_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<SourceInfo>,
}

#[derive(Serialize)]
struct SourceInfo {
    frequency_hz: f64,
    lag_ms: f64,
    capacity: usize,
    elements: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    geometry: Option<String>,
}

#[derive(Serialize)]
struct OutputInfo {
    kind: String,
    slot: usize,
    timeline: String,
    element_index: usize,
    notify_on_change: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &SessionBlueprint, args: &InfoArgs) -> ConfigInfo {
    let sync = &blueprint.synchronizer;

    let mut timelines = Vec::new();
    for kind in [TimelineKind::Frame, TimelineKind::Matrix] {
        for (index, timeline) in sync.timelines(kind).iter().enumerate() {
            let id = TimelineId::new(kind, index);
            let source = if args.sources {
                source_info(blueprint, id)
            } else {
                None
            };
            timelines.push(TimelineInfo {
                id: id.to_string(),
                name: sync.timeline_label(id),
                delay_ms: timeline.delay,
                source,
            });
        }
    }

    let mut outputs = Vec::new();
    if args.outputs {
        for kind in [TimelineKind::Frame, TimelineKind::Matrix] {
            for (slot, output) in sync.outputs(kind).iter().enumerate() {
                outputs.push(OutputInfo {
                    kind: kind.to_string(),
                    slot,
                    timeline: sync.timeline_label(TimelineId::new(kind, output.timeline_index)),
                    element_index: output.element_index,
                    notify_on_change: output.notify_on_change,
                });
            }
        }
    }

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        synchronizer: SynchronizerInfo {
            tolerance_ms: sync.tolerance,
            dispatch: if sync.legacy_auto_sync {
                "timer".to_string()
            } else {
                "on_request".to_string()
            },
            timer_period_ms: sync.legacy_auto_sync.then_some(sync.timer_period),
        },
        timelines,
        outputs,
    }
}

fn source_info(blueprint: &SessionBlueprint, id: TimelineId) -> Option<SourceInfo> {
    match id.kind {
        TimelineKind::Frame => blueprint.frame_sources.get(id.index).map(|s| SourceInfo {
            frequency_hz: s.source.frequency_hz,
            lag_ms: s.source.lag_ms,
            capacity: s.source.capacity,
            elements: s.source.elements,
            geometry: Some(format!(
                "{}x{}x{} {:?} {:?}",
                s.width, s.height, s.components, s.component_type, s.pixel_format
            )),
        }),
        TimelineKind::Matrix => blueprint.matrix_sources.get(id.index).map(|s| SourceInfo {
            frequency_hz: s.source.frequency_hz,
            lag_ms: s.source.lag_ms,
            capacity: s.source.capacity,
            elements: s.source.elements,
            geometry: None,
        }),
    }
}

fn print_config_info(info: &ConfigInfo, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Timeline Syncer Configuration                  ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Synchronizer");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Tolerance: {} ms", info.synchronizer.tolerance_ms);
    match info.synchronizer.timer_period_ms {
        Some(period) => println!("   └─ Dispatch: timer every {} ms", period),
        None => println!("   └─ Dispatch: on request"),
    }

    println!("\nTimelines ({})", info.timelines.len());
    for (i, timeline) in info.timelines.iter().enumerate() {
        let is_last = i == info.timelines.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} ({}, delay {} ms)",
            prefix, timeline.name, timeline.id, timeline.delay_ms
        );

        if args.sources {
            match &timeline.source {
                Some(source) => {
                    println!(
                        "   {}  └─ source: {} Hz, lag {} ms, {} samples, {} elements",
                        child_prefix,
                        source.frequency_hz,
                        source.lag_ms,
                        source.capacity,
                        source.elements
                    );
                    if let Some(ref geometry) = source.geometry {
                        println!("   {}     geometry: {}", child_prefix, geometry);
                    }
                }
                None => println!("   {}  └─ source: none", child_prefix),
            }
        }
    }

    if !info.outputs.is_empty() {
        println!("\nOutputs ({})", info.outputs.len());
        for (i, output) in info.outputs.iter().enumerate() {
            let prefix = if i == info.outputs.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} {} slot {} <- {} element {}{}",
                prefix,
                output.kind,
                output.slot,
                output.timeline,
                output.element_index,
                if output.notify_on_change { " (notify)" } else { "" }
            );
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        MatrixSourceConfig, OutputSlotConfig, SynchronizerConfig, TimelineConfig,
    };

    fn blueprint() -> SessionBlueprint {
        SessionBlueprint {
            synchronizer: SynchronizerConfig {
                frame_timelines: vec![TimelineConfig::default()],
                matrix_timelines: vec![TimelineConfig {
                    name: Some("probe".into()),
                    delay: 20,
                }],
                matrix_outputs: vec![OutputSlotConfig {
                    timeline_index: 0,
                    element_index: 1,
                    notify_on_change: true,
                }],
                ..Default::default()
            },
            matrix_sources: vec![MatrixSourceConfig::default()],
            ..Default::default()
        }
    }

    #[test]
    fn test_build_config_info() {
        let args = InfoArgs {
            config: "session.toml".into(),
            json: true,
            sources: true,
            outputs: true,
        };

        let info = build_config_info(&blueprint(), &args);

        assert_eq!(info.timelines.len(), 2);
        assert_eq!(info.timelines[0].name, "frame0");
        assert!(info.timelines[0].source.is_none());
        assert_eq!(info.timelines[1].name, "probe");
        assert_eq!(info.timelines[1].delay_ms, 20);
        assert!(info.timelines[1].source.is_some());
        assert_eq!(info.outputs.len(), 1);
        assert_eq!(info.outputs[0].timeline, "probe");
        assert!(info.synchronizer.timer_period_ms.is_none());
    }

    #[test]
    fn test_outputs_hidden_by_default() {
        let args = InfoArgs {
            config: "session.toml".into(),
            json: true,
            sources: false,
            outputs: false,
        };

        let info = build_config_info(&blueprint(), &args);

        assert!(info.outputs.is_empty());
        assert!(info.timelines.iter().all(|t| t.source.is_none()));
    }
}
