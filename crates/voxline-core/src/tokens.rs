//! Encrypted OAuth credential store, one blob per user.
//!
//! Records are serialized, encrypted through [`CryptoVault`], and written
//! under `token:{user_id}` in a single insert, so a reader racing a refresh
//! always sees one complete decryptable record. There are no partial-field
//! updates at this layer; callers read-modify-write the whole record.

use crate::error::EngineResult;
use crate::vault::CryptoVault;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Key prefix for credential entries within the tokens tree.
const TOKEN_PREFIX: &str = "token:";

/// One user's third-party OAuth credentials. Plaintext exists only in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl TokenRecord {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expiry(mut self, epoch_secs: i64) -> Self {
        self.expires_at = Some(epoch_secs);
        self
    }

    /// Whether the refresh job can do anything with this record.
    pub fn is_refreshable(&self) -> bool {
        self.refresh_token.is_some() && self.expires_at.is_some()
    }

    /// Whether the record expires within `threshold_secs` of `now_epoch`
    /// (or already has). Records without an expiry never report true.
    pub fn expires_within(&self, now_epoch: i64, threshold_secs: i64) -> bool {
        match self.expires_at {
            Some(at) => at - now_epoch <= threshold_secs,
            None => false,
        }
    }
}

/// CRUD + iteration over encrypted per-user credential records.
pub struct TokenVault {
    tree: sled::Tree,
    crypto: CryptoVault,
}

impl TokenVault {
    pub fn new(tree: sled::Tree, crypto: CryptoVault) -> Self {
        Self { tree, crypto }
    }

    fn storage_key(user_id: &str) -> String {
        format!("{}{}", TOKEN_PREFIX, user_id)
    }

    /// Serializes, encrypts, and stores the whole record as one atomic blob.
    pub fn set(&self, user_id: &str, record: &TokenRecord) -> EngineResult<()> {
        let plaintext = serde_json::to_vec(record)?;
        let blob = self.crypto.encrypt(&plaintext)?;
        self.tree.insert(Self::storage_key(user_id), blob)?;
        tracing::debug!(target: "voxline::tokens", user_id, "credential record written");
        Ok(())
    }

    /// Fetches and decrypts one record. Missing records are `Ok(None)`;
    /// a blob that fails integrity checks is an error the caller must see.
    pub fn get(&self, user_id: &str) -> EngineResult<Option<TokenRecord>> {
        let Some(blob) = self.tree.get(Self::storage_key(user_id))? else {
            return Ok(None);
        };
        let plaintext = self.crypto.decrypt(&blob)?;
        Ok(Some(serde_json::from_slice(plaintext.as_slice())?))
    }

    /// Removes a record. Returns whether anything was stored.
    pub fn delete(&self, user_id: &str) -> EngineResult<bool> {
        let previous = self.tree.remove(Self::storage_key(user_id))?;
        Ok(previous.is_some())
    }

    /// Decrypts every stored record for the refresh job.
    ///
    /// Skip policy: blobs may span key rotations, so a record this key cannot
    /// open (or that no longer deserializes) is logged and skipped rather than
    /// aborting the scan. One bad user must not starve every other user of a
    /// token refresh.
    pub fn iterate(&self) -> EngineResult<Vec<(String, TokenRecord)>> {
        let mut records = Vec::new();
        for item in self.tree.scan_prefix(TOKEN_PREFIX.as_bytes()) {
            let (key, blob) = item?;
            let user_id = String::from_utf8_lossy(&key[TOKEN_PREFIX.len()..]).into_owned();
            let plaintext = match self.crypto.decrypt(&blob) {
                Ok(plaintext) => plaintext,
                Err(e) => {
                    warn!(
                        target: "voxline::tokens",
                        user_id,
                        error = %e,
                        "skipping undecryptable credential record"
                    );
                    continue;
                }
            };
            match serde_json::from_slice::<TokenRecord>(plaintext.as_slice()) {
                Ok(record) => records.push((user_id, record)),
                Err(e) => {
                    warn!(
                        target: "voxline::tokens",
                        user_id,
                        error = %e,
                        "skipping malformed credential record"
                    );
                }
            }
        }
        Ok(records)
    }
}
