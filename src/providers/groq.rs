//! Groq-hosted Whisper transcription provider
//!
//! Primary backend. Authenticates with a server-configured key, so users
//! never supply their own credential for it.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::ProviderError;
use crate::types::{MAX_AUDIO_BYTES, TranscriptionOutcome};

use super::transcription::{
    ChunkStream, ProviderDescriptor, TranscriptionProvider, map_request_error, map_status_error,
    single_chunk_stream,
};
use tokio_util::sync::CancellationToken;

const LANGUAGES: &[&str] = &[
    "en", "es", "fr", "de", "it", "pt", "nl", "ru", "ja", "ko", "zh", "ar", "hi", "tr", "pl", "sv",
    "fi", "da", "no", "uk", "cs", "el", "he", "th", "vi",
];

const DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    name: "GroqWhisper",
    supported_languages: LANGUAGES,
    max_audio_bytes: Some(MAX_AUDIO_BYTES),
    cost_per_minute: None,
    requires_credential: false,
};

/// Whisper doesn't report confidence; fixed placeholder default
const DEFAULT_CONFIDENCE: f32 = 0.95;

pub struct GroqWhisperProvider {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
    probe_timeout: Duration,
    request_timeout: Duration,
}

impl GroqWhisperProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: Client::new(),
            api_key: settings.groq.api_key.clone(),
            endpoint: settings.groq.endpoint.clone(),
            model: "whisper-large-v3".to_string(),
            probe_timeout: settings.probe_timeout(),
            request_timeout: settings.request_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GroqTranscriptionResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    tokens: Option<u32>,
}

#[async_trait]
impl TranscriptionProvider for GroqWhisperProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &DESCRIPTOR
    }

    async fn is_available(&self, _credential: Option<&str>) -> bool {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("Groq provider: no server API key configured");
            return false;
        };

        let result = self
            .client
            .get(format!("{}/models", self.endpoint))
            .bearer_auth(api_key)
            .timeout(self.probe_timeout)
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Groq availability check failed: {e}");
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
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::InvalidCredential("Groq API key not configured".to_string())
        })?;

        let started = Instant::now();
        debug!("Starting Groq Whisper transcription, language: {language}");

        let file_part = Part::bytes(audio.to_vec()).file_name("audio.mp3");
        let form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "json")
            .text("language", language.to_string())
            .text("temperature", "0");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.endpoint))
            .bearer_auth(api_key)
            .multipart(form)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.request_timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Groq API error: {status} - {body}");
            return Err(map_status_error(status, &body));
        }

        let parsed: GroqTranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::BadResponse(format!("invalid Groq response: {e}")))?;

        if parsed.text.is_empty() {
            return Err(ProviderError::EmptyResult);
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(
            "Groq transcription completed in {duration_ms}ms, length: {}",
            parsed.text.len()
        );

        Ok(TranscriptionOutcome {
            id: Uuid::new_v4(),
            text: parsed.text,
            language: parsed.language.unwrap_or_else(|| language.to_string()),
            confidence: DEFAULT_CONFIDENCE,
            duration_ms,
            provider: DESCRIPTOR.name.to_string(),
            tokens: parsed.tokens.unwrap_or(0),
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
        // No native streaming; buffer and emit one terminal chunk
        debug!("Groq Whisper has no native streaming; buffering single call");
        let outcome = self.transcribe(&audio, credential, language, &cancel).await?;
        Ok(single_chunk_stream(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor() {
        assert_eq!(DESCRIPTOR.name, "GroqWhisper");
        assert!(!DESCRIPTOR.requires_credential);
        assert_eq!(DESCRIPTOR.max_audio_bytes, Some(MAX_AUDIO_BYTES));
        assert!(DESCRIPTOR.cost_per_minute.is_none());
        assert!(DESCRIPTOR.supports_language("en"));
    }

    #[test]
    fn test_response_deserialize() {
        let json = r#"{"text": "hello world", "language": "en", "tokens": 12}"#;
        let parsed: GroqTranscriptionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.text, "hello world");
        assert_eq!(parsed.tokens, Some(12));

        // minimal payload
        let parsed: GroqTranscriptionResponse =
            serde_json::from_str(r#"{"text": "hi"}"#).unwrap();
        assert!(parsed.language.is_none());
        assert!(parsed.tokens.is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_key_fails_fast() {
        let settings = Settings::default();
        let provider = GroqWhisperProvider {
            client: Client::new(),
            api_key: None,
            endpoint: settings.groq.endpoint.clone(),
            model: "whisper-large-v3".to_string(),
            probe_timeout: settings.probe_timeout(),
            request_timeout: settings.request_timeout(),
        };

        assert!(!provider.is_available(None).await);

        let err = provider
            .transcribe(&[1, 2, 3], None, "en", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidCredential(_)));
    }
}
