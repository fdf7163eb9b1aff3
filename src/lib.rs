//! AudioAssist Core - Speech-to-text orchestration with provider fallback
//!
//! Given raw audio bytes, a language, and a provider preference, the core
//! walks an ordered chain of transcription backends until one yields a
//! usable result, resolving per-user encrypted credentials, probing
//! availability, and recording usage along the way.

pub mod config;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod storage;
pub mod types;
pub mod usage;

pub use error::{Error, ProviderError, Result};
pub use types::{
    MAX_AUDIO_BYTES, TranscriptionOutcome, TranscriptionRequest, UsageRecord, UsageStatus,
};

/// Re-export the main engine components for convenience
pub use config::Settings;
pub use credentials::{CredentialResolver, ResolvedCredential};
pub use crypto::SecretCipher;
pub use orchestrator::TranscriptionService;
pub use providers::{
    ChunkStream, ProviderDescriptor, TranscriptionChunk, TranscriptionProvider,
};
pub use registry::{ProviderRegistry, build_fallback_chain};
pub use storage::Storage;
pub use usage::UsageRecorder;
