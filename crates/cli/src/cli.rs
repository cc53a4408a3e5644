//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Timeline Syncer - aligns frame and matrix timelines on a common instant
#[derive(Parser, Debug)]
#[command(
    name = "timeline-syncer",
    author,
    version,
    about = "Multi-timeline synchronizer",
    long_about = "Aligns the newest samples of several timestamped frame and matrix \n\
                  timelines within a tolerance window and writes them to outputs.\n\n\
                  The `run` command feeds in-memory timelines from mock producers \n\
                  described in the configuration file."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TIMELINE_SYNCER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TIMELINE_SYNCER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a synchronization session
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "session.toml",
        env = "TIMELINE_SYNCER_CONFIG"
    )]
    pub config: PathBuf,

    /// Stop after this many successful rounds (0 = unlimited)
    #[arg(long, default_value = "0", env = "TIMELINE_SYNCER_MAX_ROUNDS")]
    pub max_rounds: u64,

    /// Session timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "TIMELINE_SYNCER_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Interval between synchronization requests in on-request mode (ms)
    #[arg(long, default_value = "33", env = "TIMELINE_SYNCER_REQUEST_INTERVAL")]
    pub request_interval: u64,

    /// Override the tolerance window from configuration (ms)
    #[arg(long, env = "TIMELINE_SYNCER_TOLERANCE")]
    pub tolerance: Option<f64>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "TIMELINE_SYNCER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "session.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "session.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show mock source details
    #[arg(long)]
    pub sources: bool,

    /// Show output slot bindings
    #[arg(long)]
    pub outputs: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["timeline-syncer", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.config, PathBuf::from("session.toml"));
        assert_eq!(args.max_rounds, 0);
        assert_eq!(args.request_interval, 33);
        assert!(args.tolerance.is_none());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["timeline-syncer", "-q", "-v", "validate"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_info_flags() {
        let cli =
            Cli::try_parse_from(["timeline-syncer", "info", "-c", "a.json", "--sources"]).unwrap();
        let Commands::Info(args) = cli.command else {
            panic!("expected info command");
        };
        assert!(args.sources);
        assert!(!args.outputs);
        assert_eq!(args.config, PathBuf::from("a.json"));
    }
}
