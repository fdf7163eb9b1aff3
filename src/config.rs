//! Runtime settings for the transcription core
//!
//! Settings carry the default provider, the configured fallback order, and
//! per-backend endpoints. They can be loaded from a JSON file and patched
//! from environment variables.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Top-level settings for the orchestration core
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Provider used when neither the request nor the user carries a preference
    pub default_provider: String,
    /// Configured fallback order; unregistered names are skipped at chain build
    pub fallback_chain: Vec<String>,
    /// Passphrase the credential cipher key is derived from
    pub encryption_key: String,
    /// Timeout for availability probes, in seconds
    pub probe_timeout_secs: u64,
    /// Timeout for transcription requests, in seconds
    pub request_timeout_secs: u64,
    pub groq: GroqSettings,
    pub openai: OpenAiSettings,
    pub whisper_cpp: WhisperCppSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GroqSettings {
    /// Server-side API key; users do not supply their own for this backend
    pub api_key: Option<String>,
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhisperCppSettings {
    pub endpoint: String,
    pub model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_provider: "GroqWhisper".to_string(),
            fallback_chain: vec![
                "GroqWhisper".to_string(),
                "WhisperCpp".to_string(),
                "OpenAIWhisper".to_string(),
            ],
            encryption_key: "insecure-dev-key".to_string(),
            probe_timeout_secs: 5,
            request_timeout_secs: 120,
            groq: GroqSettings::default(),
            openai: OpenAiSettings::default(),
            whisper_cpp: WhisperCppSettings::default(),
        }
    }
}

impl Default for GroqSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.groq.com/openai/v1".to_string(),
        }
    }
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl Default for WhisperCppSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            model: "base".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut settings: Settings = serde_json::from_str(&raw)?;
        settings.apply_env();
        Ok(settings)
    }

    /// Default settings patched from the environment
    pub fn from_env() -> Self {
        let mut settings = Settings::default();
        settings.apply_env();
        settings
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            self.groq.api_key = Some(key);
        }
        if let Ok(endpoint) = std::env::var("WHISPER_CPP_ENDPOINT") {
            self.whisper_cpp.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("AUDIOASSIST_ENCRYPTION_KEY") {
            self.encryption_key = key;
        }
        if let Ok(provider) = std::env::var("AUDIOASSIST_DEFAULT_PROVIDER") {
            self.default_provider = provider;
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.default_provider, "GroqWhisper");
        assert_eq!(
            settings.fallback_chain,
            vec!["GroqWhisper", "WhisperCpp", "OpenAIWhisper"]
        );
        assert_eq!(settings.probe_timeout(), Duration::from_secs(5));
        assert!(settings.groq.api_key.is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "default_provider": "WhisperCpp",
                "whisper_cpp": { "endpoint": "http://10.0.0.5:8080" }
            }"#,
        )
        .unwrap();

        assert_eq!(settings.default_provider, "WhisperCpp");
        assert_eq!(settings.whisper_cpp.endpoint, "http://10.0.0.5:8080");
        // untouched sections keep their defaults
        assert_eq!(settings.whisper_cpp.model, "base");
        assert_eq!(settings.openai.endpoint, "https://api.openai.com/v1");
        assert_eq!(settings.fallback_chain.len(), 3);
    }
}
