//! Error types for ward-core

use thiserror::Error;

/// Result type alias using ward-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ward-core operations.
///
/// The sync orchestrator branches on the error kind rather than catching
/// broad categories: `Transport` and `MalformedResponse` are recoverable
/// (retry at the next cycle), everything else aborts the current cycle.
#[derive(Error, Debug)]
pub enum Error {
    /// Network unreachable, timeout, or non-2xx response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response had an unexpected shape or missing fields
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Local storage failure (SQLite or filesystem)
    #[error("Storage error: {0}")]
    Storage(String),

    /// A single record failed validation
    #[error("Invalid record: {0}")]
    Validation(String),

    /// Caller contract violation
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Whether a retry at the next scheduled cycle can succeed without
    /// any local repair. Recoverable errors leave no partial state behind.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::MalformedResponse(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::MalformedResponse(error.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::MalformedResponse(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}
