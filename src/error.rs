//! Error types for the transcription core

use std::time::Duration;

use thiserror::Error;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Terminal errors surfaced to callers of the orchestration core
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid request: {0}")]
    Validation(String),

    /// Every provider in the fallback chain was skipped, failed, or
    /// returned empty text. Carries the last underlying failure if one
    /// was observed.
    #[error("all transcription providers failed")]
    AllProvidersFailed {
        #[source]
        last: Option<ProviderError>,
    },

    #[error("transcription cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("encryption error: {0}")]
    Crypto(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-adapter failures. Always recoverable by advancing the fallback
/// chain; never surfaced to the caller individually.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("provider returned empty transcription")]
    EmptyResult,

    #[error("provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("transcription not supported: {0}")]
    Unsupported(String),
}
