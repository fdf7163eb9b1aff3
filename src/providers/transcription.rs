//! Transcription provider contract and shared types

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{ProviderError, Result};
use crate::types::TranscriptionOutcome;

/// Static capability description of one speech-to-text backend
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    /// Unique provider name, used as the registry key
    pub name: &'static str,
    /// Language codes the backend accepts (ISO 639-1)
    pub supported_languages: &'static [&'static str],
    /// Maximum accepted payload size in bytes, if the backend enforces one
    pub max_audio_bytes: Option<usize>,
    /// Cost per minute of audio in dollars; None for free/unpriced backends
    pub cost_per_minute: Option<f64>,
    /// Whether a per-user credential must be resolved before calling
    pub requires_credential: bool,
}

impl ProviderDescriptor {
    pub fn supports_language(&self, language: &str) -> bool {
        self.supported_languages.contains(&language)
    }
}

/// One piece of a streaming transcription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionChunk {
    pub index: u32,
    pub text: String,
    pub is_final: bool,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

/// Finite, non-restartable stream of transcription chunks
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<TranscriptionChunk>> + Send>>;

/// Trait for speech-to-text backends
///
/// Adapters normalize their backend's wire format into the common
/// outcome/error shapes and never substitute another provider's identity.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Static capability description. Pure, no I/O.
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Lightweight reachability probe with a short timeout. Returns false
    /// on any network or auth error; never fails.
    async fn is_available(&self, credential: Option<&str>) -> bool;

    /// Transcribe the full audio payload in one backend call
    async fn transcribe(
        &self,
        audio: &[u8],
        credential: Option<&str>,
        language: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<TranscriptionOutcome, ProviderError>;

    /// Stream transcription chunks. Backends without native streaming
    /// buffer the audio, run one transcribe call, and emit a single
    /// terminal chunk.
    async fn transcribe_streaming(
        &self,
        audio: Vec<u8>,
        credential: Option<&str>,
        language: &str,
        cancel: CancellationToken,
    ) -> std::result::Result<ChunkStream, ProviderError>;
}

/// Wrap one completed outcome as a single-chunk terminal stream
pub fn single_chunk_stream(outcome: TranscriptionOutcome) -> ChunkStream {
    let chunk = TranscriptionChunk {
        index: 0,
        text: outcome.text,
        is_final: true,
        confidence: outcome.confidence,
        timestamp: Utc::now(),
    };
    Box::pin(futures::stream::iter([Ok(chunk)]))
}

/// Map a failed HTTP round trip into the provider error taxonomy
pub(crate) fn map_request_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else if err.is_connect() {
        ProviderError::Unavailable(err.to_string())
    } else if err.is_decode() {
        ProviderError::BadResponse(err.to_string())
    } else {
        ProviderError::Unavailable(err.to_string())
    }
}

/// Map a non-success HTTP status plus body into the provider error taxonomy
pub(crate) fn map_status_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        ProviderError::InvalidCredential(format!("{status}: {body}"))
    } else {
        ProviderError::BadResponse(format!("{status}: {body}"))
    }
}
