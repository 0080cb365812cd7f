//! Engine configuration. Load from TOML or env.

use crate::escalation::DEFAULT_ESCALATION_KEYWORDS;
use crate::oauth::DEFAULT_OAUTH_TTL;
use crate::refresh::DEFAULT_REFRESH_THRESHOLD;
use crate::session::{DEFAULT_RETRY_LIMIT, DEFAULT_SIMILAR_SUMMARIES_LIMIT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Global engine configuration. Load from TOML or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base directory for the sled database.
    pub data_dir: String,
    /// Base64-encoded 16-byte AES key for the credential vault. Env: VOXLINE__TOKEN_KEY.
    #[serde(default)]
    pub token_key: Option<String>,
    /// Seconds an OAuth state parameter stays redeemable.
    pub oauth_ttl_secs: u64,
    /// How many times a conflicting session write is retried before giving up.
    pub history_retry_limit: u32,
    /// How many prior-call summaries get attached to a new session.
    pub similar_summaries_limit: usize,
    /// Seconds-to-expiry below which a credential gets refreshed.
    pub refresh_threshold_secs: u64,
    /// Phrases that trip the escalation monitor. Matched case-insensitively.
    pub escalation_keywords: Vec<String>,
    /// Number a caller is bridged to when a human takes over.
    #[serde(default)]
    pub handoff_number: Option<String>,
    /// Number that receives the heads-up SMS before the bridge. Optional.
    #[serde(default)]
    pub escalation_notify_number: Option<String>,
}

impl EngineConfig {
    /// Programmatic constructor with stock limits, for tests and embedders.
    pub fn new(data_dir: impl Into<String>, token_key: Option<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            token_key,
            oauth_ttl_secs: DEFAULT_OAUTH_TTL.as_secs(),
            history_retry_limit: DEFAULT_RETRY_LIMIT,
            similar_summaries_limit: DEFAULT_SIMILAR_SUMMARIES_LIMIT,
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD.as_secs(),
            escalation_keywords: DEFAULT_ESCALATION_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            handoff_number: None,
            escalation_notify_number: None,
        }
    }

    pub fn oauth_ttl(&self) -> Duration {
        Duration::from_secs(self.oauth_ttl_secs)
    }

    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_secs(self.refresh_threshold_secs)
    }

    /// Load config from file and environment. Precedence: env `VOXLINE_CONFIG` path > `config/engine.toml` > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("VOXLINE_CONFIG").unwrap_or_else(|_| "config/engine".to_string());
        let builder = config::Config::builder()
            .set_default("data_dir", "./data")?
            .set_default("oauth_ttl_secs", DEFAULT_OAUTH_TTL.as_secs() as i64)?
            .set_default("history_retry_limit", DEFAULT_RETRY_LIMIT as i64)?
            .set_default("similar_summaries_limit", DEFAULT_SIMILAR_SUMMARIES_LIMIT as i64)?
            .set_default("refresh_threshold_secs", DEFAULT_REFRESH_THRESHOLD.as_secs() as i64)?
            .set_default(
                "escalation_keywords",
                DEFAULT_ESCALATION_KEYWORDS
                    .iter()
                    .map(|k| k.to_string())
                    .collect::<Vec<_>>(),
            )?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("VOXLINE").separator("__"))
            .build()?;

        built.try_deserialize()
    }
}
