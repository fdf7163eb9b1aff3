//! Claude STT placeholder provider
//!
//! Claude models do not transcribe audio. The adapter is registered for
//! forward compatibility and reports itself unavailable; every call fails
//! immediately with an unsupported error instead of hitting the network.

use async_trait::async_trait;
use tracing::warn;

use crate::error::ProviderError;
use crate::types::TranscriptionOutcome;

use super::transcription::{ChunkStream, ProviderDescriptor, TranscriptionProvider};
use tokio_util::sync::CancellationToken;

const DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    name: "ClaudeHaiku",
    supported_languages: &[],
    max_audio_bytes: None,
    cost_per_minute: None,
    requires_credential: true,
};

const UNSUPPORTED_MESSAGE: &str =
    "Claude Haiku does not support audio transcription; use GroqWhisper, OpenAIWhisper, or WhisperCpp";

#[derive(Default)]
pub struct ClaudeSttProvider;

impl ClaudeSttProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TranscriptionProvider for ClaudeSttProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &DESCRIPTOR
    }

    async fn is_available(&self, _credential: Option<&str>) -> bool {
        false
    }

    async fn transcribe(
        &self,
        _audio: &[u8],
        _credential: Option<&str>,
        _language: &str,
        _cancel: &CancellationToken,
    ) -> Result<TranscriptionOutcome, ProviderError> {
        warn!("Claude Haiku transcription attempted but audio is not supported");
        Err(ProviderError::Unsupported(UNSUPPORTED_MESSAGE.to_string()))
    }

    async fn transcribe_streaming(
        &self,
        _audio: Vec<u8>,
        _credential: Option<&str>,
        _language: &str,
        _cancel: CancellationToken,
    ) -> Result<ChunkStream, ProviderError> {
        warn!("Claude Haiku streaming transcription attempted but audio is not supported");
        Err(ProviderError::Unsupported(UNSUPPORTED_MESSAGE.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_unavailable() {
        let provider = ClaudeSttProvider::new();
        assert!(!provider.is_available(None).await);
        assert!(!provider.is_available(Some("some-key")).await);
    }

    #[tokio::test]
    async fn test_calls_fail_unsupported() {
        let provider = ClaudeSttProvider::new();
        let cancel = CancellationToken::new();

        let err = provider
            .transcribe(&[1], Some("key"), "en", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(_)));

        let err = provider
            .transcribe_streaming(vec![1], Some("key"), "en", cancel)
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(_)));
    }

    #[test]
    fn test_descriptor_announces_gap() {
        assert!(DESCRIPTOR.supported_languages.is_empty());
        assert!(DESCRIPTOR.requires_credential);
    }
}
