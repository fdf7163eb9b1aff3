//! Secret encryption for stored provider credentials
//!
//! AES-256-GCM with a key derived from a configured passphrase. The
//! ciphertext is base64-encoded with the nonce prepended, so a stored
//! secret is a single opaque string.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const NONCE_LEN: usize = 12;

/// Symmetric cipher for credential secrets
#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl SecretCipher {
    /// Derive a 256-bit key from the configured passphrase
    pub fn new(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Encrypt a plaintext secret to base64(nonce || ciphertext)
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| Error::Crypto(format!("encryption failed: {e}")))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }

    /// Decrypt a base64(nonce || ciphertext) blob back to the plaintext secret
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let blob = STANDARD
            .decode(encoded)
            .map_err(|e| Error::Crypto(format!("invalid ciphertext encoding: {e}")))?;

        if blob.len() <= NONCE_LEN {
            return Err(Error::Crypto("ciphertext too short".to_string()));
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| Error::Crypto(format!("decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| Error::Crypto(format!("decrypted secret is not utf-8: {e}")))
    }
}
