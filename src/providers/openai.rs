//! OpenAI Whisper transcription provider
//!
//! Secondary backend. Requires a per-user API key resolved from the
//! encrypted credential store.

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
    "fi", "da", "no", "uk", "cs", "el", "he", "th", "vi", "id", "ms", "bn", "ta", "te", "mr", "ur",
    "fa",
];

const DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    name: "OpenAIWhisper",
    supported_languages: LANGUAGES,
    max_audio_bytes: Some(MAX_AUDIO_BYTES),
    cost_per_minute: Some(0.006),
    requires_credential: true,
};

const DEFAULT_CONFIDENCE: f32 = 0.97;

pub struct OpenAiWhisperProvider {
    client: Client,
    endpoint: String,
    model: String,
    probe_timeout: Duration,
    request_timeout: Duration,
}

impl OpenAiWhisperProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: Client::new(),
            endpoint: settings.openai.endpoint.clone(),
            model: "whisper-1".to_string(),
            probe_timeout: settings.probe_timeout(),
            request_timeout: settings.request_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiTranscriptionResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    tokens: Option<u32>,
}

#[async_trait]
impl TranscriptionProvider for OpenAiWhisperProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &DESCRIPTOR
    }

    async fn is_available(&self, credential: Option<&str>) -> bool {
        let Some(api_key) = credential else {
            warn!("OpenAI provider: no user API key available");
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
                warn!("OpenAI availability check failed: {e}");
                false
            }
        }
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        credential: Option<&str>,
        language: &str,
        _cancel: &CancellationToken,
    ) -> Result<TranscriptionOutcome, ProviderError> {
        let api_key = credential.ok_or_else(|| {
            ProviderError::InvalidCredential("OpenAI API key not provided".to_string())
        })?;

        let started = Instant::now();
        debug!("Starting OpenAI Whisper transcription, language: {language}");

        let file_part = Part::bytes(audio.to_vec()).file_name("audio.mp3");
        let form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("language", language.to_string())
            .text("response_format", "json");

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
            error!("OpenAI API error: {status} - {body}");
            return Err(map_status_error(status, &body));
        }

        let parsed: OpenAiTranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::BadResponse(format!("invalid OpenAI response: {e}")))?;

        if parsed.text.is_empty() {
            return Err(ProviderError::EmptyResult);
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(
            "OpenAI transcription completed in {duration_ms}ms, length: {}",
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
        debug!("OpenAI Whisper has no native streaming; buffering single call");
        let outcome = self.transcribe(&audio, credential, language, &cancel).await?;
        Ok(single_chunk_stream(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor() {
        assert_eq!(DESCRIPTOR.name, "OpenAIWhisper");
        assert!(DESCRIPTOR.requires_credential);
        assert_eq!(DESCRIPTOR.cost_per_minute, Some(0.006));
        assert!(DESCRIPTOR.supports_language("fa"));
    }

    #[test]
    fn test_response_deserialize() {
        let parsed: OpenAiTranscriptionResponse =
            serde_json::from_str(r#"{"text": "guten tag", "language": "de"}"#).unwrap();
        assert_eq!(parsed.text, "guten tag");
        assert_eq!(parsed.language.as_deref(), Some("de"));
    }

    #[tokio::test]
    async fn test_missing_credential_fails_fast() {
        let provider = OpenAiWhisperProvider::new(&Settings::default());

        assert!(!provider.is_available(None).await);

        let err = provider
            .transcribe(&[1, 2, 3], None, "en", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidCredential(_)));
    }
}
