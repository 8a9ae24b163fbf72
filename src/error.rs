// src/error.rs
//
// Unified error type for the précis training harness.
//
// Error taxonomy:
// - InvalidState:      environment driven outside its state machine (usage bug)
// - InsufficientData:  replay sample requested below batch size (recoverable;
//                      the trainer skips the update and reports it)
// - MalformedMetrics:  a metric came out non-finite (fatal; a poisoned reward
//                      must never reach the agent silently)
// - Configuration:     bad run parameters, rejected before any stepping

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrecisError {
    /// Environment operation attempted in the wrong state.
    #[error("invalid environment state: {0}")]
    InvalidState(String),

    /// Replay buffer holds fewer transitions than the requested batch.
    #[error("insufficient replay data: have {available}, need {requested}")]
    InsufficientData { available: usize, requested: usize },

    /// A quality metric produced a non-finite value.
    #[error("malformed metrics: field '{field}' is non-finite ({value})")]
    MalformedMetrics { field: &'static str, value: f64 },

    /// Invalid configuration detected at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O failure (article loading, CSV/JSONL export).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure (telemetry records, snapshots).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PrecisError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        PrecisError::InvalidState(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        PrecisError::Configuration(message.into())
    }

    /// True for errors the trainer recovers from by skipping, not aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PrecisError::InsufficientData { .. })
    }
}

pub type Result<T> = std::result::Result<T, PrecisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_is_recoverable() {
        let err = PrecisError::InsufficientData {
            available: 2,
            requested: 8,
        };
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("have 2"));
    }

    #[test]
    fn test_other_kinds_are_fatal() {
        assert!(!PrecisError::invalid_state("step before reset").is_recoverable());
        assert!(!PrecisError::configuration("rounds must be positive").is_recoverable());
        let err = PrecisError::MalformedMetrics {
            field: "similarity",
            value: f64::NAN,
        };
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("similarity"));
    }
}
