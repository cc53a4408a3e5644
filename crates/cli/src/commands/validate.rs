//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigWarning;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<ConfigWarning>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    dispatch: String,
    tolerance_ms: f64,
    frame_timelines: usize,
    matrix_timelines: usize,
    output_slots: usize,
    sources: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_with_warnings(&args.config) {
        Ok((blueprint, warnings)) => {
            let sync = &blueprint.synchronizer;
            let dispatch = if sync.legacy_auto_sync {
                format!("timer ({} ms)", sync.timer_period)
            } else {
                "on request".to_string()
            };

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    dispatch,
                    tolerance_ms: sync.tolerance,
                    frame_timelines: sync.frame_timelines.len(),
                    matrix_timelines: sync.matrix_timelines.len(),
                    output_slots: sync.frame_outputs.len() + sync.matrix_outputs.len(),
                    sources: blueprint.frame_sources.len() + blueprint.matrix_sources.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Dispatch: {}", summary.dispatch);
            println!("  Tolerance: {} ms", summary.tolerance_ms);
            println!("  Frame timelines: {}", summary.frame_timelines);
            println!("  Matrix timelines: {}", summary.matrix_timelines);
            println!("  Output slots: {}", summary.output_slots);
            println!("  Sources: {}", summary.sources);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_for(content: &str) -> (tempfile::NamedTempFile, ValidateArgs) {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        (file, args)
    }

    #[test]
    fn test_valid_with_warnings() {
        let (_file, args) = args_for(
            r#"
[[synchronizer.matrix_timelines]]
name = "probe"

[[synchronizer.matrix_outputs]]
timeline_index = 2
"#,
        );

        let result = validate_config(&args);

        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings
            .iter()
            .any(|w| w.field == "synchronizer.matrix_outputs[0]"
                && w.message.contains("undeclared matrix2")));
        assert!(warnings.iter().any(|w| w.message.contains("probe has no source")));
        assert_eq!(result.summary.unwrap().output_slots, 1);
    }

    #[test]
    fn test_invalid_config() {
        let (_file, args) = args_for("[synchronizer]\ntimer_period = 0\n");
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: "does/not/exist.toml".into(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }
}
