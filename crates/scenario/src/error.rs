//! Scenario error types

use contracts::{ContractError, SensorKind};
use stream_engine::EngineError;
use thiserror::Error;

/// Scenario / controller specific error
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Invalid stream selection or call order
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Stream requested that was never registered
    #[error("sensor '{sensor}' is not registered")]
    UnregisteredSensor { sensor: SensorKind },

    /// Wrapped engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScenarioError {
    /// Create configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Both configuration variants count as configuration errors
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::UnregisteredSensor { .. }
        )
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, ScenarioError>;
