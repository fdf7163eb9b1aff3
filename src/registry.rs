//! Provider registry and fallback chain construction
//!
//! The registry is an explicit name-to-adapter map built once at startup
//! and shared read-only across calls. Chain building is deterministic and
//! pure: preferred provider first, then the configured fallback order with
//! duplicates and unregistered names dropped.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Settings;
use crate::providers::{
    ClaudeSttProvider, GroqWhisperProvider, OpenAiWhisperProvider, TranscriptionProvider,
    WhisperCppProvider,
};

/// Immutable map from provider name to adapter instance
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn TranscriptionProvider>>,
    index: HashMap<&'static str, usize>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Registry with the standard adapter set, built from settings
    pub fn standard(settings: &Settings) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GroqWhisperProvider::new(settings)));
        registry.register(Arc::new(WhisperCppProvider::new(settings)));
        registry.register(Arc::new(OpenAiWhisperProvider::new(settings)));
        registry.register(Arc::new(ClaudeSttProvider::new()));
        registry
    }

    /// Register an adapter; a repeated name replaces the earlier instance
    pub fn register(&mut self, provider: Arc<dyn TranscriptionProvider>) {
        let name = provider.descriptor().name;
        match self.index.get(name) {
            Some(&slot) => self.providers[slot] = provider,
            None => {
                self.index.insert(name, self.providers.len());
                self.providers.push(provider);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TranscriptionProvider>> {
        self.index.get(name).map(|&slot| self.providers[slot].clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered provider names in registration order
    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.descriptor().name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn TranscriptionProvider>> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the ordered, deduplicated fallback chain for one request.
///
/// The preferred provider comes first when registered; the remaining
/// configured names follow in their configured order. Unregistered names
/// degrade gracefully and are skipped without error.
pub fn build_fallback_chain(
    preferred: &str,
    configured_order: &[String],
    registry: &ProviderRegistry,
) -> Vec<Arc<dyn TranscriptionProvider>> {
    let mut chain = Vec::new();
    let mut seen: Vec<&str> = Vec::new();

    if let Some(provider) = registry.get(preferred) {
        seen.push(provider.descriptor().name);
        chain.push(provider);
    }

    for name in configured_order {
        if seen.contains(&name.as_str()) {
            continue;
        }
        if let Some(provider) = registry.get(name) {
            seen.push(provider.descriptor().name);
            chain.push(provider);
        }
    }

    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::ProviderError;
    use crate::providers::{ChunkStream, ProviderDescriptor};
    use crate::types::TranscriptionOutcome;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct NamedProvider(&'static ProviderDescriptor);

    #[async_trait]
    impl TranscriptionProvider for NamedProvider {
        fn descriptor(&self) -> &ProviderDescriptor {
            self.0
        }

        async fn is_available(&self, _credential: Option<&str>) -> bool {
            true
        }

        async fn transcribe(
            &self,
            _audio: &[u8],
            _credential: Option<&str>,
            _language: &str,
            _cancel: &CancellationToken,
        ) -> Result<TranscriptionOutcome, ProviderError> {
            Err(ProviderError::EmptyResult)
        }

        async fn transcribe_streaming(
            &self,
            _audio: Vec<u8>,
            _credential: Option<&str>,
            _language: &str,
            _cancel: CancellationToken,
        ) -> Result<ChunkStream, ProviderError> {
            Err(ProviderError::EmptyResult)
        }
    }

    fn registry_of(names: &[&'static ProviderDescriptor]) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for d in names {
            registry.register(Arc::new(NamedProvider(d)));
        }
        registry
    }

    static GROQ: ProviderDescriptor = ProviderDescriptor {
        name: "GroqWhisper",
        supported_languages: &["en"],
        max_audio_bytes: None,
        cost_per_minute: None,
        requires_credential: false,
    };
    static LOCAL: ProviderDescriptor = ProviderDescriptor {
        name: "WhisperCpp",
        supported_languages: &["en"],
        max_audio_bytes: None,
        cost_per_minute: None,
        requires_credential: false,
    };
    static OPENAI: ProviderDescriptor = ProviderDescriptor {
        name: "OpenAIWhisper",
        supported_languages: &["en"],
        max_audio_bytes: None,
        cost_per_minute: None,
        requires_credential: true,
    };

    fn order(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_preferred_first() {
        let registry = registry_of(&[&GROQ, &LOCAL, &OPENAI]);
        let chain = build_fallback_chain(
            "OpenAIWhisper",
            &order(&["GroqWhisper", "WhisperCpp", "OpenAIWhisper"]),
            &registry,
        );

        let names: Vec<_> = chain.iter().map(|p| p.descriptor().name).collect();
        assert_eq!(names, vec!["OpenAIWhisper", "GroqWhisper", "WhisperCpp"]);
    }

    #[test]
    fn test_no_duplicates() {
        let registry = registry_of(&[&GROQ, &LOCAL]);
        let chain = build_fallback_chain(
            "GroqWhisper",
            &order(&["GroqWhisper", "GroqWhisper", "WhisperCpp"]),
            &registry,
        );

        let names: Vec<_> = chain.iter().map(|p| p.descriptor().name).collect();
        assert_eq!(names, vec!["GroqWhisper", "WhisperCpp"]);
    }

    #[test]
    fn test_unregistered_names_skipped_silently() {
        let registry = registry_of(&[&GROQ]);
        let chain = build_fallback_chain(
            "NoSuchProvider",
            &order(&["AlsoMissing", "GroqWhisper"]),
            &registry,
        );

        let names: Vec<_> = chain.iter().map(|p| p.descriptor().name).collect();
        assert_eq!(names, vec!["GroqWhisper"]);
    }

    #[test]
    fn test_idempotent() {
        let registry = registry_of(&[&GROQ, &LOCAL, &OPENAI]);
        let configured = order(&["GroqWhisper", "WhisperCpp", "OpenAIWhisper"]);

        let a: Vec<_> = build_fallback_chain("WhisperCpp", &configured, &registry)
            .iter()
            .map(|p| p.descriptor().name)
            .collect();
        let b: Vec<_> = build_fallback_chain("WhisperCpp", &configured, &registry)
            .iter()
            .map(|p| p.descriptor().name)
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_registry_yields_empty_chain() {
        let registry = ProviderRegistry::new();
        let chain = build_fallback_chain("GroqWhisper", &order(&["GroqWhisper"]), &registry);
        assert!(chain.is_empty());
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(NamedProvider(&GROQ)));
        registry.register(Arc::new(NamedProvider(&GROQ)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["GroqWhisper"]);
    }

    #[test]
    fn test_standard_registry() {
        let registry = ProviderRegistry::standard(&Settings::default());
        assert_eq!(
            registry.names(),
            vec!["GroqWhisper", "WhisperCpp", "OpenAIWhisper", "ClaudeHaiku"]
        );
    }
}
