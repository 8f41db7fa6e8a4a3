//! Credential Vault
//!
//! Seals broker credentials with AES-256-GCM. The key is the SHA-256 digest
//! of the configured secret; each blob is `hex(nonce || ciphertext || tag)`
//! with a fresh 96-bit nonce per seal.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::connection::{BrokerCredentials, SealedCredentials};
use crate::error::{EngineError, ErrorCode};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Vault errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// The configured secret is empty.
    #[error("vault secret key must not be empty")]
    EmptyKey,

    /// The credentials could not be serialized or encrypted.
    #[error("failed to seal credentials: {0}")]
    Seal(String),

    /// The blob was not produced by this vault.
    #[error("failed to decrypt credentials: {0}")]
    Decryption(String),
}

impl From<VaultError> for EngineError {
    fn from(err: VaultError) -> Self {
        let code = match &err {
            VaultError::Decryption(_) => ErrorCode::DecryptionFailed,
            VaultError::EmptyKey | VaultError::Seal(_) => ErrorCode::InternalError,
        };
        Self::new(code, err.to_string())
    }
}

/// Symmetric credential vault.
#[derive(Clone)]
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault").finish_non_exhaustive()
    }
}

impl CredentialVault {
    /// Derive the vault key from a secret.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::EmptyKey`] if the secret is empty.
    pub fn new(secret: &str) -> Result<Self, VaultError> {
        if secret.is_empty() {
            return Err(VaultError::EmptyKey);
        }
        let key = Sha256::digest(secret.as_bytes());
        Ok(Self {
            cipher: Aes256Gcm::new(&key),
        })
    }

    /// Encrypt credential fields into an opaque blob.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Seal`] if serialization or encryption fails.
    pub fn seal(&self, credentials: &BrokerCredentials) -> Result<SealedCredentials, VaultError> {
        let plaintext =
            serde_json::to_vec(credentials).map_err(|e| VaultError::Seal(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|e| VaultError::Seal(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(SealedCredentials::from_encoded(hex::encode(blob)))
    }

    /// Decrypt a blob produced by [`CredentialVault::seal`].
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Decryption`] if the blob is not hex, is too
    /// short, was sealed under another key, was tampered with, or does not
    /// decode to credential fields.
    pub fn unseal(&self, sealed: &SealedCredentials) -> Result<BrokerCredentials, VaultError> {
        let blob = hex::decode(sealed.as_encoded())
            .map_err(|e| VaultError::Decryption(format!("invalid encoding: {e}")))?;
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::Decryption(format!(
                "blob too short ({} bytes)",
                blob.len()
            )));
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| VaultError::Decryption("authentication failed".to_string()))?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| VaultError::Decryption(format!("invalid payload: {e}")))
    }
}
