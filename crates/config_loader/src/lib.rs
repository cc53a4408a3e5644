//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Report non-fatal issues and normalize the result
//! - Generate `SessionBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("session.toml")).unwrap();
//! println!("Tolerance: {} ms", blueprint.synchronizer.tolerance);
//! ```

mod parser;
mod validator;

pub use contracts::SessionBlueprint;
pub use parser::ConfigFormat;
pub use validator::{collect_warnings, ConfigWarning};

use contracts::ContractError;
use std::path::Path;
use tracing::warn;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    /// Warnings are logged; negative delays are clamped to 0.
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<SessionBlueprint, ContractError> {
        let (blueprint, warnings) = Self::load_with_warnings(path)?;
        log_warnings(&warnings);
        Ok(blueprint)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SessionBlueprint, ContractError> {
        let (blueprint, warnings) = Self::parse_and_validate(content, format)?;
        log_warnings(&warnings);
        Ok(blueprint)
    }

    /// Load configuration and return the warnings instead of logging them
    pub fn load_with_warnings(
        path: &Path,
    ) -> Result<(SessionBlueprint, Vec<ConfigWarning>), ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::parse_and_validate(&content, format)
    }

    /// Serialize SessionBlueprint to TOML string
    pub fn to_toml(blueprint: &SessionBlueprint) -> Result<String, ContractError> {
        parser::render(blueprint, ConfigFormat::Toml)
    }

    /// Serialize SessionBlueprint to JSON string
    pub fn to_json(blueprint: &SessionBlueprint) -> Result<String, ContractError> {
        parser::render(blueprint, ConfigFormat::Json)
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse, validate, collect warnings, then normalize
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<(SessionBlueprint, Vec<ConfigWarning>), ContractError> {
        let mut blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        let warnings = validator::collect_warnings(&blueprint);
        validator::normalize(&mut blueprint);
        Ok((blueprint, warnings))
    }
}

fn log_warnings(warnings: &[ConfigWarning]) {
    for warning in warnings {
        warn!(field = %warning.field, "{}", warning.message);
    }
}
