//! Error types for the voxline call engine

use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur across the call engine.
///
/// Taxonomy: configuration errors are fatal at startup; integrity errors
/// (vault decrypt failures) propagate to the caller; missing records are
/// `Ok(None)`/empty results rather than errors so the live-call path stays
/// resilient to cold state.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vault error: {0}")]
    Vault(#[from] crate::vault::VaultError),

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Semantic memory error: {0}")]
    Semantic(#[from] crate::semantic::SemanticError),

    #[error("Session write for call {call_id} still conflicting after {attempts} attempts")]
    WriteConflict { call_id: String, attempts: u32 },

    #[error("Token refresh error: {0}")]
    Refresh(String),

    #[error("Telephony error: {0}")]
    Telephony(String),

    #[error("Job queue error: {0}")]
    JobQueue(String),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}
