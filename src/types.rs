//! Core data model: transcription requests, outcomes, and usage records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard ceiling on audio payload size accepted by the orchestrator (25 MiB).
pub const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// A single transcription request. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    audio: Vec<u8>,
    language: String,
    preferred_provider: Option<String>,
    user_id: i64,
}

impl TranscriptionRequest {
    pub fn new(audio: Vec<u8>, user_id: i64) -> Self {
        Self {
            audio,
            language: "en".to_string(),
            preferred_provider: None,
            user_id,
        }
    }

    /// Set the requested language (ISO 639-1 code, e.g. "en")
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Explicitly request a provider, overriding any stored preference
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.preferred_provider = Some(provider.into());
        self
    }

    pub fn audio(&self) -> &[u8] {
        &self.audio
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn preferred_provider(&self) -> Option<&str> {
        self.preferred_provider.as_deref()
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }
}

/// The single successful result of one orchestration call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionOutcome {
    pub id: Uuid,
    /// Transcribed text (never empty for a surfaced outcome)
    pub text: String,
    /// Detected or requested language code
    pub language: String,
    /// Confidence score in [0, 1]; a fixed per-backend default when the
    /// backend does not report one
    pub confidence: f32,
    /// Elapsed time of the backend call in milliseconds
    pub duration_ms: u64,
    /// Name of the provider that produced this outcome
    pub provider: String,
    /// Token count reported by the backend (0 when not applicable)
    pub tokens: u32,
    pub completed_at: DateTime<Utc>,
    /// True iff the producing provider differs from the one the caller
    /// explicitly requested
    pub used_fallback: bool,
}

/// Accounting status of a usage record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageStatus {
    Completed,
    Failed,
}

impl UsageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageStatus::Completed => "completed",
            UsageStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for UsageStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "completed" => Ok(UsageStatus::Completed),
            "failed" => Ok(UsageStatus::Failed),
            other => Err(format!("unknown usage status: {other}")),
        }
    }
}

/// Append-only accounting entry written after a terminal orchestration
/// attempt. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: Uuid,
    pub user_id: i64,
    pub provider: String,
    pub language: String,
    pub duration_ms: u64,
    pub text_length: u32,
    pub confidence: f32,
    /// Computed cost in dollars; None for free/unpriced providers
    pub cost: Option<f64>,
    pub status: UsageStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = TranscriptionRequest::new(vec![1, 2, 3], 42);
        assert_eq!(request.language(), "en");
        assert!(request.preferred_provider().is_none());
        assert_eq!(request.user_id(), 42);
        assert_eq!(request.audio(), &[1, 2, 3]);
    }

    #[test]
    fn test_request_builders() {
        let request = TranscriptionRequest::new(vec![0], 1)
            .with_language("de")
            .with_provider("WhisperCpp");
        assert_eq!(request.language(), "de");
        assert_eq!(request.preferred_provider(), Some("WhisperCpp"));
    }

    #[test]
    fn test_usage_status_round_trip() {
        for status in [UsageStatus::Completed, UsageStatus::Failed] {
            let parsed: UsageStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("pending".parse::<UsageStatus>().is_err());
    }
}
