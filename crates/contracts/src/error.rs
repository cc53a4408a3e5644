//! Layered error definitions
//!
//! Categorized by source: config / timeline / output

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Key that does not name a timeline delay (`frameDelay_<n>` / `matrixDelay_<n>`)
    #[error("unknown delay key '{key}'")]
    UnknownKey { key: String },

    // ===== Timeline Errors =====
    /// Frame geometry cannot describe a pixel buffer
    #[error("invalid frame geometry: {message}")]
    InvalidGeometry { message: String },

    // ===== Output Errors =====
    /// Output write error
    #[error("output write error: {message}")]
    OutputWrite { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create invalid geometry error
    pub fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }

    /// Create output write error
    pub fn output_write(message: impl Into<String>) -> Self {
        Self::OutputWrite {
            message: message.into(),
        }
    }
}
