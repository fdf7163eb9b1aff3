//! Transcription orchestration across the provider fallback chain
//!
//! One call walks the chain strictly sequentially: resolve the credential,
//! probe availability, transcribe, validate. Recoverable provider failures
//! advance the chain as explicit per-attempt results; only terminal
//! validation, cancellation, or total-exhaustion errors reach the caller.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::credentials::{CredentialResolver, ResolvedCredential};
use crate::crypto::SecretCipher;
use crate::error::{Error, ProviderError, Result};
use crate::providers::{ChunkStream, TranscriptionProvider};
use crate::registry::{ProviderRegistry, build_fallback_chain};
use crate::storage::Storage;
use crate::types::{MAX_AUDIO_BYTES, TranscriptionOutcome, TranscriptionRequest};
use crate::usage::UsageRecorder;

/// Result of one provider attempt within a chain walk
enum Attempt {
    Completed(TranscriptionOutcome),
    /// Structurally valid call that produced empty text; soft failure
    Empty,
    Skipped(SkipReason),
    Failed(ProviderError),
}

#[derive(Debug, Clone, Copy)]
enum SkipReason {
    MissingCredential,
    Unavailable,
    PayloadTooLarge,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingCredential => write!(f, "no credential stored"),
            SkipReason::Unavailable => write!(f, "availability probe failed"),
            SkipReason::PayloadTooLarge => write!(f, "payload exceeds provider limit"),
        }
    }
}

/// Orchestrates transcription across registered providers
pub struct TranscriptionService {
    registry: Arc<ProviderRegistry>,
    storage: Arc<Storage>,
    credentials: CredentialResolver,
    usage: UsageRecorder,
    settings: Settings,
}

impl TranscriptionService {
    pub fn new(registry: Arc<ProviderRegistry>, storage: Arc<Storage>, settings: Settings) -> Self {
        let cipher = SecretCipher::new(&settings.encryption_key);
        let credentials = CredentialResolver::new(storage.clone(), cipher);
        let usage = UsageRecorder::new(storage.clone(), registry.clone());
        Self {
            registry,
            storage,
            credentials,
            usage,
            settings,
        }
    }

    pub fn credentials(&self) -> &CredentialResolver {
        &self.credentials
    }

    /// Transcribe one audio payload, attempting providers in fallback
    /// order until one yields non-empty text
    pub async fn transcribe(
        &self,
        request: &TranscriptionRequest,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionOutcome> {
        if request.audio().is_empty() {
            return Err(Error::Validation("audio payload is empty".to_string()));
        }
        if request.audio().len() > MAX_AUDIO_BYTES {
            return Err(Error::Validation(format!(
                "audio payload of {} bytes exceeds the {} byte limit",
                request.audio().len(),
                MAX_AUDIO_BYTES
            )));
        }

        let preference = self.effective_preference(request)?;
        info!(
            "Starting transcription for user {}, language {}, preference {}",
            request.user_id(),
            request.language(),
            preference
        );

        let chain = build_fallback_chain(&preference, &self.settings.fallback_chain, &self.registry);

        let mut last_failure: Option<ProviderError> = None;
        let mut saw_empty = false;

        for provider in chain {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let name = provider.descriptor().name;
            match self.attempt(provider.as_ref(), request, cancel).await? {
                Attempt::Completed(mut outcome) => {
                    outcome.used_fallback = request
                        .preferred_provider()
                        .is_some_and(|requested| requested != outcome.provider);
                    info!(
                        "Transcription succeeded with {}: {} chars in {}ms",
                        name,
                        outcome.text.len(),
                        outcome.duration_ms
                    );
                    self.usage.record_success(request.user_id(), &outcome);
                    return Ok(outcome);
                }
                Attempt::Empty => {
                    warn!("Provider {name} returned empty text, trying next");
                    saw_empty = true;
                }
                Attempt::Skipped(reason) => {
                    warn!("Skipping provider {name}: {reason}");
                }
                Attempt::Failed(e) => {
                    error!("Provider {name} failed: {e}, trying next");
                    last_failure = Some(e);
                }
            }
        }

        if last_failure.is_none() && saw_empty {
            last_failure = Some(ProviderError::EmptyResult);
        }
        Err(Error::AllProvidersFailed { last: last_failure })
    }

    /// Streaming variant of the chain walk. Commits to the first provider
    /// whose stream starts; mid-stream failures are not retried against
    /// later providers.
    pub async fn transcribe_streaming(
        &self,
        request: &TranscriptionRequest,
        cancel: &CancellationToken,
    ) -> Result<ChunkStream> {
        if request.audio().is_empty() {
            return Err(Error::Validation("audio payload is empty".to_string()));
        }
        if request.audio().len() > MAX_AUDIO_BYTES {
            return Err(Error::Validation(format!(
                "audio payload of {} bytes exceeds the {} byte limit",
                request.audio().len(),
                MAX_AUDIO_BYTES
            )));
        }

        let preference = self.effective_preference(request)?;
        let chain = build_fallback_chain(&preference, &self.settings.fallback_chain, &self.registry);

        let mut last_failure: Option<ProviderError> = None;

        for provider in chain {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let name = provider.descriptor().name;
            if let Some(max) = provider.descriptor().max_audio_bytes {
                if request.audio().len() > max {
                    warn!(
                        "Skipping provider {name} for streaming: {}",
                        SkipReason::PayloadTooLarge
                    );
                    continue;
                }
            }

            let credential = match self.resolve_credential(provider.as_ref(), request.user_id()) {
                Ok(credential) => credential,
                Err(reason) => {
                    warn!("Skipping provider {name} for streaming: {reason}");
                    continue;
                }
            };

            let available = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                available = provider.is_available(credential.as_deref()) => available,
            };
            if !available {
                warn!("Provider {name} is not available for streaming, trying next");
                continue;
            }

            let stream = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                result = provider.transcribe_streaming(
                    request.audio().to_vec(),
                    credential.as_deref(),
                    request.language(),
                    cancel.clone(),
                ) => result,
            };

            match stream {
                Ok(stream) => {
                    info!("Streaming transcription committed to provider {name}");
                    return Ok(forward_stream(stream, cancel.clone()));
                }
                Err(e) => {
                    error!("Provider {name} streaming failed: {e}, trying next");
                    last_failure = Some(e);
                }
            }
        }

        Err(Error::AllProvidersFailed { last: last_failure })
    }

    /// Probe every registered provider with no credential and return the
    /// names of those that respond available
    pub async fn available_providers(&self) -> Vec<&'static str> {
        let mut available = Vec::new();
        for provider in self.registry.iter() {
            if provider.is_available(None).await {
                available.push(provider.descriptor().name);
            }
        }
        available
    }

    /// Upsert the user's stored provider preference. The name is accepted
    /// as-is, without validation against the registry.
    pub fn set_preferred_provider(&self, user_id: i64, provider: &str) -> Result<()> {
        self.storage.set_preferred_provider(user_id, provider)
    }

    pub fn preferred_provider(&self, user_id: i64) -> Result<Option<String>> {
        self.storage.get_preferred_provider(user_id)
    }

    /// Explicit request override, else stored user preference, else the
    /// configured default
    fn effective_preference(&self, request: &TranscriptionRequest) -> Result<String> {
        if let Some(provider) = request.preferred_provider() {
            return Ok(provider.to_string());
        }
        if let Some(provider) = self.storage.get_preferred_provider(request.user_id())? {
            return Ok(provider);
        }
        Ok(self.settings.default_provider.clone())
    }

    fn resolve_credential(
        &self,
        provider: &dyn TranscriptionProvider,
        user_id: i64,
    ) -> std::result::Result<Option<String>, SkipReason> {
        match self.credentials.resolve(user_id, provider.descriptor()) {
            ResolvedCredential::Secret(secret) => Ok(Some(secret)),
            ResolvedCredential::NotRequired => Ok(None),
            ResolvedCredential::NotFound => Err(SkipReason::MissingCredential),
        }
    }

    /// Run one provider attempt. Recoverable failures come back as
    /// `Attempt` values; only cancellation propagates as an error.
    async fn attempt(
        &self,
        provider: &dyn TranscriptionProvider,
        request: &TranscriptionRequest,
        cancel: &CancellationToken,
    ) -> Result<Attempt> {
        let descriptor = provider.descriptor();

        if let Some(max) = descriptor.max_audio_bytes {
            if request.audio().len() > max {
                return Ok(Attempt::Skipped(SkipReason::PayloadTooLarge));
            }
        }

        let credential = match self.resolve_credential(provider, request.user_id()) {
            Ok(credential) => credential,
            Err(reason) => return Ok(Attempt::Skipped(reason)),
        };

        let available = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            available = provider.is_available(credential.as_deref()) => available,
        };
        if !available {
            return Ok(Attempt::Skipped(SkipReason::Unavailable));
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = provider.transcribe(
                request.audio(),
                credential.as_deref(),
                request.language(),
                cancel,
            ) => result,
        };

        match result {
            Ok(outcome) if outcome.text.trim().is_empty() => Ok(Attempt::Empty),
            Ok(outcome) => Ok(Attempt::Completed(outcome)),
            Err(e) => Ok(Attempt::Failed(e)),
        }
    }
}

/// Bridge a provider's chunk stream through a bounded channel, checking
/// cancellation between yields
fn forward_stream(mut stream: ChunkStream, cancel: CancellationToken) -> ChunkStream {
    use futures::StreamExt;

    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = tx.send(Err(Error::Cancelled)).await;
                    break;
                }
                item = stream.next() => match item {
                    Some(item) => {
                        if tx.send(item).await.is_err() {
                            // consumer dropped the stream
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}
