//! Local whisper.cpp HTTP server provider
//!
//! Offline fallback backend talking to a local inference server. Free,
//! credential-less, and tolerant of much larger payloads than the hosted
//! backends.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::ProviderError;
use crate::types::TranscriptionOutcome;

use super::transcription::{
    ChunkStream, ProviderDescriptor, TranscriptionProvider, map_request_error, map_status_error,
    single_chunk_stream,
};
use tokio_util::sync::CancellationToken;

const LANGUAGES: &[&str] = &[
    "en", "es", "fr", "de", "it", "pt", "nl", "ru", "ja", "ko", "zh", "ar", "hi", "tr", "pl", "sv",
    "fi", "da", "no", "uk", "cs", "el", "he", "th", "vi", "id", "ms", "bn", "ta", "te", "mr", "ur",
    "fa", "sw",
];

const DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    name: "WhisperCpp",
    supported_languages: LANGUAGES,
    // local processing handles much larger files
    max_audio_bytes: Some(500 * 1024 * 1024),
    cost_per_minute: None,
    requires_credential: false,
};

/// Used when the server reports no confidence of its own
const DEFAULT_CONFIDENCE: f32 = 0.85;

pub struct WhisperCppProvider {
    client: Client,
    endpoint: String,
    model: String,
    probe_timeout: Duration,
    request_timeout: Duration,
}

impl WhisperCppProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: Client::new(),
            endpoint: settings.whisper_cpp.endpoint.clone(),
            model: settings.whisper_cpp.model.clone(),
            probe_timeout: settings.probe_timeout(),
            request_timeout: settings.request_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WhisperCppResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

#[async_trait]
impl TranscriptionProvider for WhisperCppProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &DESCRIPTOR
    }

    async fn is_available(&self, _credential: Option<&str>) -> bool {
        let result = self
            .client
            .get(format!("{}/health", self.endpoint))
            .timeout(self.probe_timeout)
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(
                    "whisper.cpp availability check failed at {}: {e}",
                    self.endpoint
                );
                false
            }
        }
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        _credential: Option<&str>,
        language: &str,
        _cancel: &CancellationToken,
    ) -> Result<TranscriptionOutcome, ProviderError> {
        let started = Instant::now();
        debug!("Starting whisper.cpp transcription, language: {language}");

        let parameters = json!({
            "language": language,
            "temperature": 0.0,
            "model": self.model,
        });

        let file_part = Part::bytes(audio.to_vec()).file_name("audio.mp3");
        let form = Form::new()
            .part("file", file_part)
            .text("parameters", parameters.to_string());

        let response = self
            .client
            .post(format!("{}/inference", self.endpoint))
            .multipart(form)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.request_timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("whisper.cpp error: {status} - {body}");
            return Err(map_status_error(status, &body));
        }

        let parsed: WhisperCppResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::BadResponse(format!("invalid whisper.cpp response: {e}")))?;

        if parsed.text.is_empty() {
            return Err(ProviderError::EmptyResult);
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(
            "whisper.cpp transcription completed in {duration_ms}ms, length: {}",
            parsed.text.len()
        );

        Ok(TranscriptionOutcome {
            id: Uuid::new_v4(),
            text: parsed.text,
            language: parsed.language.unwrap_or_else(|| language.to_string()),
            confidence: parsed.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            duration_ms,
            provider: DESCRIPTOR.name.to_string(),
            // local processing does not track tokens
            tokens: 0,
            completed_at: Utc::now(),
            used_fallback: false,
        })
    }

    async fn transcribe_streaming(
        &self,
        audio: Vec<u8>,
        credential: Option<&str>,
        language: &str,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, ProviderError> {
        debug!("whisper.cpp endpoint has no native streaming; buffering single call");
        let outcome = self.transcribe(&audio, credential, language, &cancel).await?;
        Ok(single_chunk_stream(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor() {
        assert_eq!(DESCRIPTOR.name, "WhisperCpp");
        assert!(!DESCRIPTOR.requires_credential);
        assert_eq!(DESCRIPTOR.max_audio_bytes, Some(500 * 1024 * 1024));
        assert!(DESCRIPTOR.cost_per_minute.is_none());
    }

    #[test]
    fn test_response_confidence_fallback() {
        let parsed: WhisperCppResponse =
            serde_json::from_str(r#"{"text": "bonjour", "confidence": 0.73}"#).unwrap();
        assert_eq!(parsed.confidence, Some(0.73));

        let parsed: WhisperCppResponse = serde_json::from_str(r#"{"text": "bonjour"}"#).unwrap();
        assert!(parsed.confidence.is_none());
        assert_eq!(parsed.confidence.unwrap_or(DEFAULT_CONFIDENCE), 0.85);
    }
}
