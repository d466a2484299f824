//! Error handling - fatal, run-aborting failures
//!
//! Locally recoverable conditions (bad intents, limit truncation, missing
//! market data) are handled inside the engine and never surface here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Replay error hierarchy
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader/writer errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed market or bot data
    #[error("Data error: {0}")]
    Data(String),

    /// Strategy failed while deciding
    #[error("Strategy error: {0}")]
    Strategy(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}
