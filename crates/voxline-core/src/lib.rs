//! voxline-core: call engine core (session state, credential vault, escalation).
//!
//! Everything a live voice call needs between media events: per-call session
//! records with conflict-checked writes, encrypted credential storage,
//! single-use OAuth states, keyword escalation, and the human handoff
//! sequence. Storage is one sled database per engine; external systems
//! (semantic memory, summarization, telephony) sit behind traits.

mod config;
mod engine;
mod error;
mod escalation;
mod jobs;
mod oauth;
mod refresh;
mod secure;
mod semantic;
mod session;
mod telephony;
mod tokens;
mod vault;

// Engine context + configuration
pub use config::EngineConfig;
pub use engine::CallEngine;
pub use error::{EngineError, EngineResult};

// Credential vault (AES-128-GCM at rest, mlocked plaintext in memory)
pub use secure::LockedVec;
pub use tokens::{TokenRecord, TokenVault};
pub use vault::{CryptoVault, VaultError, KEY_LEN};

// OAuth single-use state handshake
pub use oauth::{OAuthStateMap, DEFAULT_OAUTH_TTL};

// Session state + conversation history
pub use session::{
    HistoryEntry, SessionFields, SessionStore, DEFAULT_RETRY_LIMIT, DEFAULT_SIMILAR_SUMMARIES_LIMIT,
};

// Semantic memory collaborator (recall across calls)
pub use semantic::{LexicalMemory, SemanticError, SemanticHit, SemanticMemory, SemanticResult};

// Escalation detection + human handoff
pub use escalation::{
    contains_keyword, EscalationMonitor, Summarizer, TruncationSummarizer,
    DEFAULT_ESCALATION_KEYWORDS,
};
pub use telephony::{HandoffCoordinator, Telephony};

// Out-of-band work: background jobs and the credential refresh sweep
pub use jobs::{InProcessQueue, Job, JobQueue};
pub use refresh::{refresh_expiring_tokens, TokenRefresher, DEFAULT_REFRESH_THRESHOLD};
