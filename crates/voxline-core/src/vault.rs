//! **Credential vault crypto** — AES-128-GCM primitives for token storage.
//!
//! OAuth credential records are encrypted at rest. Each blob is stored as
//! `[12-byte nonce][ciphertext+tag]` with a fresh random nonce per write via
//! `OsRng`. The key arrives base64-encoded and must decode to exactly 16
//! bytes; anything else is a configuration error and construction fails, so
//! a misconfigured process dies at startup instead of writing blobs it can
//! never read back.
//!
//! Decrypted plaintext is returned in a [`LockedVec`] (mlock + zero-on-drop)
//! so credentials never reach swap.

use crate::secure::LockedVec;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes128Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

/// AES-GCM nonce length (96 bits).
const NONCE_LEN: usize = 12;

/// Key length after base64 decoding (128 bits).
pub const KEY_LEN: usize = 16;

/// Errors specific to the credential vault.
#[derive(Debug, Clone, Error)]
pub enum VaultError {
    /// No encryption key was configured. Fatal at startup.
    #[error("token encryption key is not configured")]
    KeyMissing,
    /// The configured key is malformed (bad base64 or wrong length). Fatal at startup.
    #[error("token encryption key is invalid: {0}")]
    InvalidKey(String),
    /// Encryption failed (should never happen with a valid key).
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    /// Decryption failed: wrong key or tampered blob.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    /// The stored blob is too short to contain a nonce.
    #[error("corrupt blob (shorter than nonce)")]
    CorruptBlob,
}

/// AES-128-GCM encrypt/decrypt over the process-wide token key.
///
/// Construction is fail-fast: a `CryptoVault` always holds a usable cipher.
pub struct CryptoVault {
    cipher: Aes128Gcm,
}

impl CryptoVault {
    /// Creates a vault from a raw 16-byte key.
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        let cipher = Aes128Gcm::new_from_slice(key).expect("key length is 16");
        Self { cipher }
    }

    /// Creates a vault from a base64-encoded key, typically straight from
    /// configuration. `None`, empty, undecodable, or wrong-length input is a
    /// configuration error.
    pub fn from_base64(encoded: Option<&str>) -> Result<Self, VaultError> {
        let encoded = encoded
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(VaultError::KeyMissing)?;
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| VaultError::InvalidKey(e.to_string()))?;
        if bytes.len() != KEY_LEN {
            return Err(VaultError::InvalidKey(format!(
                "expected {} bytes after base64 decode, got {}",
                KEY_LEN,
                bytes.len()
            )));
        }
        let cipher =
            Aes128Gcm::new_from_slice(&bytes).map_err(|e| VaultError::InvalidKey(e.to_string()))?;
        tracing::info!(target: "voxline::vault", "🔐 credential vault ready (AES-128-GCM)");
        Ok(Self { cipher })
    }

    /// Encrypts plaintext into `[nonce || ciphertext]`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        let nonce = Aes128Gcm::generate_nonce(OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypts a blob previously produced by [`encrypt`](Self::encrypt).
    ///
    /// Returns `CorruptBlob` if the blob cannot even contain a nonce, and
    /// `DecryptionFailed` on a wrong key or tampered data. Never returns
    /// garbage: GCM authentication makes tampering an error, not noise.
    pub fn decrypt(&self, blob: &[u8]) -> Result<LockedVec, VaultError> {
        if blob.len() < NONCE_LEN {
            return Err(VaultError::CorruptBlob);
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| VaultError::DecryptionFailed(e.to_string()))?;
        Ok(LockedVec::new(plaintext))
    }
}
