//! Error types for cyclecast
//!
//! The engine itself never fails: infeasible predictions are reported as data.
//! These errors only cover the boundary (JSON requests, configuration, log sources).

use thiserror::Error;

/// Errors that can occur while preparing or serializing an engine request
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Log source error: {0}")]
    SourceError(String),
}
