//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::session::{Session, SessionConfig};

/// Execute the `run` command
pub async fn run_session(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    // Load and parse configuration
    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(tolerance) = args.tolerance {
        if !(tolerance > 0.0 && tolerance.is_finite()) {
            return Err(CliError::config_validation(format!(
                "--tolerance must be a positive number of milliseconds, got {tolerance}"
            ))
            .into());
        }
        info!(tolerance, "Overriding tolerance from CLI");
        blueprint.synchronizer.tolerance = tolerance;
    }

    let sync = &blueprint.synchronizer;
    info!(
        tolerance = sync.tolerance,
        legacy_auto_sync = sync.legacy_auto_sync,
        frame_timelines = sync.frame_timelines.len(),
        matrix_timelines = sync.matrix_timelines.len(),
        frame_outputs = sync.frame_outputs.len(),
        matrix_outputs = sync.matrix_outputs.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let session_config = SessionConfig {
        blueprint,
        max_rounds: (args.max_rounds > 0).then_some(args.max_rounds),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        request_interval: Duration::from_millis(args.request_interval.max(1)),
    };

    let session = Session::new(session_config);

    // Setup graceful shutdown handler
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting session...");

    tokio::select! {
        result = session.run() => {
            let stats = result.context("Session execution failed")?;
            info!(
                rounds_done = stats.rounds_done,
                duration_secs = stats.duration.as_secs_f64(),
                rounds_per_sec = format!("{:.2}", stats.rounds_per_sec()),
                "Session completed successfully"
            );
            stats.print_summary();
        }
        signal = shutdown_signal => {
            signal?;
            warn!("Received shutdown signal, stopping session...");
        }
    }

    info!("Timeline Syncer finished");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn setup_shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to install Ctrl+C handler")
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("Failed to install SIGTERM handler")?;
        signal.recv().await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => result,
        result = terminate => result,
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::SessionBlueprint) {
    let sync = &blueprint.synchronizer;

    println!("\n=== Configuration Summary ===\n");
    println!("Synchronizer:");
    println!("  Tolerance: {} ms", sync.tolerance);
    if sync.legacy_auto_sync {
        println!("  Dispatch: timer ({} ms)", sync.timer_period);
    } else {
        println!("  Dispatch: on request");
    }

    println!("\nFrame timelines ({}):", sync.frame_timelines.len());
    for (index, timeline) in sync.frame_timelines.iter().enumerate() {
        let label = sync.timeline_label(contracts::TimelineId::frame(index));
        println!("  - {} (delay {} ms)", label, timeline.delay);
    }

    println!("\nMatrix timelines ({}):", sync.matrix_timelines.len());
    for (index, timeline) in sync.matrix_timelines.iter().enumerate() {
        let label = sync.timeline_label(contracts::TimelineId::matrix(index));
        println!("  - {} (delay {} ms)", label, timeline.delay);
    }

    println!(
        "\nOutputs: {} frame, {} matrix",
        sync.frame_outputs.len(),
        sync.matrix_outputs.len()
    );
    println!(
        "Sources: {} frame, {} matrix",
        blueprint.frame_sources.len(),
        blueprint.matrix_sources.len()
    );

    println!();
}
