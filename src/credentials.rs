//! Per-user provider credential resolution and management
//!
//! Secrets are stored encrypted and decrypted only on read; plaintext is
//! never cached beyond the call and never logged.

use std::sync::Arc;

use tracing::{info, warn};

use crate::crypto::SecretCipher;
use crate::error::{Error, Result};
use crate::providers::ProviderDescriptor;
use crate::storage::Storage;

/// Result of resolving a credential for one (user, provider) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedCredential {
    /// Decrypted secret for a credential-requiring provider
    Secret(String),
    /// The provider authenticates server-side; no user secret involved
    NotRequired,
    /// The provider needs a secret but none is stored for this user
    NotFound,
}

/// Resolves, stores, and deletes encrypted per-user provider secrets
pub struct CredentialResolver {
    storage: Arc<Storage>,
    cipher: SecretCipher,
}

impl CredentialResolver {
    pub fn new(storage: Arc<Storage>, cipher: SecretCipher) -> Self {
        Self { storage, cipher }
    }

    /// Resolve the credential for one provider attempt. Pure read.
    ///
    /// Lookup or decryption failures degrade to `NotFound` so a broken
    /// stored secret skips the provider instead of failing the call.
    pub fn resolve(&self, user_id: i64, descriptor: &ProviderDescriptor) -> ResolvedCredential {
        if !descriptor.requires_credential {
            return ResolvedCredential::NotRequired;
        }

        let encrypted = match self.storage.get_api_key(user_id, descriptor.name) {
            Ok(Some(encrypted)) => encrypted,
            Ok(None) => return ResolvedCredential::NotFound,
            Err(e) => {
                warn!(
                    "Credential lookup failed for user {} provider {}: {e}",
                    user_id, descriptor.name
                );
                return ResolvedCredential::NotFound;
            }
        };

        match self.cipher.decrypt(&encrypted) {
            Ok(secret) => ResolvedCredential::Secret(secret),
            Err(e) => {
                warn!(
                    "Stored credential for user {} provider {} cannot be decrypted: {e}",
                    user_id, descriptor.name
                );
                ResolvedCredential::NotFound
            }
        }
    }

    /// Encrypt and store a secret for (user, provider), replacing any
    /// existing one
    pub fn store(&self, user_id: i64, provider: &str, secret: &str) -> Result<()> {
        if provider.trim().is_empty() {
            return Err(Error::Validation("provider name is required".to_string()));
        }
        if secret.trim().is_empty() {
            return Err(Error::Validation("credential secret is required".to_string()));
        }

        let encrypted = self.cipher.encrypt(secret)?;
        self.storage.store_api_key(user_id, provider, &encrypted)?;
        info!("Stored credential for user {} provider {}", user_id, provider);
        Ok(())
    }

    /// Delete a stored secret; returns whether one existed
    pub fn delete(&self, user_id: i64, provider: &str) -> Result<bool> {
        let deleted = self.storage.delete_api_key(user_id, provider)?;
        if deleted {
            info!("Deleted credential for user {} provider {}", user_id, provider);
        }
        Ok(deleted)
    }

    /// Mark a stored secret inactive without deleting the row; resolution
    /// treats it as absent until a new secret is stored
    pub fn deactivate(&self, user_id: i64, provider: &str) -> Result<bool> {
        let deactivated = self.storage.deactivate_api_key(user_id, provider)?;
        if deactivated {
            info!(
                "Deactivated credential for user {} provider {}",
                user_id, provider
            );
        }
        Ok(deactivated)
    }

    /// Providers for which the user has an active stored credential
    pub fn providers_with_credentials(&self, user_id: i64) -> Result<Vec<String>> {
        self.storage.list_key_providers(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> CredentialResolver {
        let storage = Arc::new(Storage::in_memory().unwrap());
        CredentialResolver::new(storage, SecretCipher::new("test-key"))
    }

    fn credentialed(name: &'static str) -> ProviderDescriptor {
        ProviderDescriptor {
            name,
            supported_languages: &["en"],
            max_audio_bytes: None,
            cost_per_minute: None,
            requires_credential: true,
        }
    }

    #[test]
    fn test_not_required_short_circuits() {
        let resolver = resolver();
        let descriptor = ProviderDescriptor {
            requires_credential: false,
            ..credentialed("GroqWhisper")
        };
        assert_eq!(
            resolver.resolve(1, &descriptor),
            ResolvedCredential::NotRequired
        );
    }

    #[test]
    fn test_store_then_resolve_round_trip() {
        let resolver = resolver();
        let descriptor = credentialed("OpenAIWhisper");

        assert_eq!(resolver.resolve(1, &descriptor), ResolvedCredential::NotFound);

        resolver.store(1, "OpenAIWhisper", "sk-secret").unwrap();
        assert_eq!(
            resolver.resolve(1, &descriptor),
            ResolvedCredential::Secret("sk-secret".to_string())
        );

        // scoped per user
        assert_eq!(resolver.resolve(2, &descriptor), ResolvedCredential::NotFound);
    }

    #[test]
    fn test_delete() {
        let resolver = resolver();
        let descriptor = credentialed("OpenAIWhisper");

        resolver.store(1, "OpenAIWhisper", "sk-secret").unwrap();
        assert!(resolver.delete(1, "OpenAIWhisper").unwrap());
        assert!(!resolver.delete(1, "OpenAIWhisper").unwrap());
        assert_eq!(resolver.resolve(1, &descriptor), ResolvedCredential::NotFound);
    }

    #[test]
    fn test_undecryptable_secret_degrades_to_not_found() {
        let storage = Arc::new(Storage::in_memory().unwrap());
        let descriptor = credentialed("OpenAIWhisper");

        // stored under one key, resolved with another
        let writer = CredentialResolver::new(storage.clone(), SecretCipher::new("key-a"));
        writer.store(1, "OpenAIWhisper", "sk-secret").unwrap();

        let reader = CredentialResolver::new(storage, SecretCipher::new("key-b"));
        assert_eq!(reader.resolve(1, &descriptor), ResolvedCredential::NotFound);
    }

    #[test]
    fn test_deactivated_secret_resolves_not_found() {
        let resolver = resolver();
        let descriptor = credentialed("OpenAIWhisper");

        resolver.store(1, "OpenAIWhisper", "sk-secret").unwrap();
        assert!(resolver.deactivate(1, "OpenAIWhisper").unwrap());
        assert!(!resolver.deactivate(1, "OpenAIWhisper").unwrap());
        assert_eq!(resolver.resolve(1, &descriptor), ResolvedCredential::NotFound);

        // storing again restores resolution
        resolver.store(1, "OpenAIWhisper", "sk-new").unwrap();
        assert_eq!(
            resolver.resolve(1, &descriptor),
            ResolvedCredential::Secret("sk-new".to_string())
        );
    }

    #[test]
    fn test_store_rejects_blank_input() {
        let resolver = resolver();
        assert!(resolver.store(1, "", "secret").is_err());
        assert!(resolver.store(1, "OpenAIWhisper", "   ").is_err());
    }

    #[test]
    fn test_providers_with_credentials() {
        let resolver = resolver();
        resolver.store(1, "OpenAIWhisper", "sk-one").unwrap();
        resolver.store(1, "ClaudeHaiku", "sk-two").unwrap();
        resolver.store(2, "OpenAIWhisper", "sk-three").unwrap();

        let providers = resolver.providers_with_credentials(1).unwrap();
        assert_eq!(providers, vec!["ClaudeHaiku", "OpenAIWhisper"]);
    }
}
