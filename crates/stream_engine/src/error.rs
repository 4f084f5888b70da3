//! Engine errors

use contracts::{Consent, ContractError, FrameKind};
use thiserror::Error;

/// Errors raised by sensor and video engines
#[derive(Debug, Error)]
pub enum EngineError {
    /// Driver call failed (open, resolution query, buffer fetch)
    #[error("driver failure on '{sensor}': {source}")]
    Driver {
        sensor: String,
        #[source]
        source: ContractError,
    },

    /// Accessor called on an engine streaming another frame type
    #[error("type mismatch on '{sensor}': requested {requested}, engine streams {actual}")]
    TypeMismatch {
        sensor: String,
        requested: &'static str,
        actual: FrameKind,
    },

    /// Consent request answered with a denial
    #[error("camera access for '{sensor}' {consent}")]
    ConsentDenied { sensor: String, consent: Consent },

    /// Archive open, append or close failed
    #[error("archive error on '{sensor}': {message}")]
    Archive { sensor: String, message: String },

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn driver(sensor: impl Into<String>, source: ContractError) -> Self {
        Self::Driver {
            sensor: sensor.into(),
            source,
        }
    }

    pub fn archive(sensor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Archive {
            sensor: sensor.into(),
            message: message.into(),
        }
    }

    pub fn type_mismatch(sensor: impl Into<String>, requested: &'static str, actual: FrameKind) -> Self {
        Self::TypeMismatch {
            sensor: sensor.into(),
            requested,
            actual,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
