//! Layered error definitions
//!
//! Categorized by source: config / driver / archive / io

use thiserror::Error;

/// Result alias for contract operations
pub type Result<T> = std::result::Result<T, ContractError>;

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

    // ===== Driver Errors =====
    /// Sensor driver call failed (open, resolution query, buffer fetch)
    #[error("driver failure on sensor '{sensor}': {message}")]
    DriverFailure { sensor: String, message: String },

    /// Driver dropped a single request; the stream itself is still usable
    #[error("transient driver failure on sensor '{sensor}': {message}")]
    TransientDriver { sensor: String, message: String },

    /// Sensor descriptor not reported by the device
    #[error("sensor not found: {sensor}")]
    SensorNotFound { sensor: String },

    // ===== Archive Errors =====
    /// Archive write error
    #[error("archive '{archive}' write error: {message}")]
    ArchiveWrite { archive: String, message: String },

    /// Archive already closed
    #[error("archive '{archive}' is closed")]
    ArchiveClosed { archive: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
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

    /// Create driver failure
    pub fn driver(sensor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DriverFailure {
            sensor: sensor.into(),
            message: message.into(),
        }
    }

    /// Create transient driver failure
    pub fn transient(sensor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientDriver {
            sensor: sensor.into(),
            message: message.into(),
        }
    }

    /// Create archive write error
    pub fn archive_write(archive: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ArchiveWrite {
            archive: archive.into(),
            message: message.into(),
        }
    }

    /// Whether the failed call may succeed if simply retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientDriver { .. })
    }
}
