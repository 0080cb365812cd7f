//! The engine context: one handle owning the database and every subsystem.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::escalation::{EscalationMonitor, Summarizer, TruncationSummarizer};
use crate::oauth::OAuthStateMap;
use crate::refresh::{refresh_expiring_tokens, TokenRefresher};
use crate::semantic::{LexicalMemory, SemanticMemory};
use crate::session::SessionStore;
use crate::telephony::{HandoffCoordinator, Telephony};
use crate::tokens::TokenVault;
use crate::vault::CryptoVault;
use std::sync::Arc;
use tracing::info;

const TOKENS_TREE: &str = "tokens";
const OAUTH_TREE: &str = "oauth";
const SESSIONS_TREE: &str = "sessions";

/// One handle per process owning the database and every subsystem.
///
/// Nothing in the engine reaches for globals; tests run engines side by side
/// against separate data directories.
pub struct CallEngine {
    config: EngineConfig,
    db: sled::Db,
    tokens: TokenVault,
    oauth: OAuthStateMap,
    sessions: SessionStore,
    escalation: EscalationMonitor,
}

impl CallEngine {
    /// Opens the engine with the in-process semantic memory and summarizer.
    pub fn open(config: EngineConfig) -> EngineResult<Self> {
        Self::open_with(
            config,
            Arc::new(LexicalMemory::new()),
            Arc::new(TruncationSummarizer::default()),
        )
    }

    /// Opens the engine with explicit collaborators.
    ///
    /// Fails fast when the vault key is missing or malformed: an engine that
    /// cannot encrypt credentials must never come up.
    pub fn open_with(
        config: EngineConfig,
        semantic: Arc<dyn SemanticMemory>,
        summarizer: Arc<dyn Summarizer>,
    ) -> EngineResult<Self> {
        let crypto = CryptoVault::from_base64(config.token_key.as_deref())?;
        let db = sled::open(&config.data_dir)?;

        let tokens = TokenVault::new(db.open_tree(TOKENS_TREE)?, crypto);
        let oauth = OAuthStateMap::new(db.open_tree(OAUTH_TREE)?, config.oauth_ttl());
        let sessions = SessionStore::new(
            db.open_tree(SESSIONS_TREE)?,
            semantic,
            config.similar_summaries_limit,
            config.history_retry_limit,
        );
        let escalation = EscalationMonitor::new(config.escalation_keywords.clone(), summarizer);

        info!(target: "voxline::engine", data_dir = %config.data_dir, "call engine ready");
        Ok(Self {
            config,
            db,
            tokens,
            oauth,
            sessions,
            escalation,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenVault {
        &self.tokens
    }

    pub fn oauth(&self) -> &OAuthStateMap {
        &self.oauth
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn escalation(&self) -> &EscalationMonitor {
        &self.escalation
    }

    /// Scans one caller utterance and runs the escalation sequence on a match.
    pub async fn check_turn(&self, call_id: &str, text: &str) -> EngineResult<bool> {
        self.escalation.check_and_flag(&self.sessions, call_id, text).await
    }

    /// Refreshes every credential inside the configured expiry window.
    pub async fn refresh_credentials(&self, refresher: &dyn TokenRefresher) -> EngineResult<usize> {
        refresh_expiring_tokens(&self.tokens, refresher, self.config.refresh_threshold()).await
    }

    /// Builds the handoff coordinator for the configured destination number.
    pub fn handoff(&self, telephony: Arc<dyn Telephony>) -> EngineResult<HandoffCoordinator> {
        let handoff_number = self
            .config
            .handoff_number
            .clone()
            .ok_or_else(|| EngineError::Config("handoff_number is not configured".into()))?;
        Ok(HandoffCoordinator::new(
            self.sessions.clone(),
            telephony,
            handoff_number,
            self.config.escalation_notify_number.clone(),
        ))
    }

    /// Flushes sled to disk. Call before shutdown.
    pub fn flush(&self) -> EngineResult<usize> {
        Ok(self.db.flush()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::{VaultError, KEY_LEN};
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use std::sync::Mutex;

    fn test_key_b64() -> String {
        let mut key = [0u8; KEY_LEN];
        for (i, b) in key.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(7).wrapping_add(42);
        }
        BASE64.encode(key)
    }

    fn open_engine(dir: &tempfile::TempDir) -> CallEngine {
        let config = EngineConfig::new(
            dir.path().to_string_lossy().to_string(),
            Some(test_key_b64()),
        );
        CallEngine::open(config).expect("engine opens")
    }

    #[test]
    fn missing_vault_key_prevents_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::new(dir.path().to_string_lossy().to_string(), None);
        match CallEngine::open(config) {
            Err(EngineError::Vault(VaultError::KeyMissing)) => {}
            other => panic!("expected KeyMissing, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn subsystems_share_one_database() {
        let dir = tempfile::tempdir().unwrap();
        let engine = open_engine(&dir);

        engine
            .tokens()
            .set("alice", &crate::tokens::TokenRecord::new("at"))
            .unwrap();
        assert!(engine.tokens().get("alice").unwrap().is_some());

        let state = engine.oauth().issue("alice").unwrap();
        assert_eq!(engine.oauth().pop(&state).unwrap().as_deref(), Some("alice"));

        engine
            .sessions()
            .create("call1", [("from".to_string(), "+15551234".to_string())].into())
            .await
            .unwrap();
        assert!(!engine.sessions().get("call1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn check_turn_flags_and_summarizes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = open_engine(&dir);

        engine.sessions().create("call1", Default::default()).await.unwrap();
        engine.sessions().append_history("call1", "caller", "I want a human now").unwrap();

        assert!(engine.check_turn("call1", "I want a human now").await.unwrap());
        assert!(engine.sessions().is_escalation_required("call1").unwrap());
        assert!(!engine.check_turn("call1", "thanks, all good").await.unwrap());
        assert!(
            engine.sessions().is_escalation_required("call1").unwrap(),
            "flag stays set once raised"
        );
    }

    struct RecordingTelephony {
        bridges: Mutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl Telephony for RecordingTelephony {
        async fn bridge_call(&self, call_id: &str, destination: &str) -> EngineResult<()> {
            self.bridges
                .lock()
                .unwrap()
                .push((call_id.to_string(), destination.to_string()));
            Ok(())
        }

        async fn send_sms(&self, _to: &str, _body: &str) -> EngineResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn handoff_requires_a_configured_number() {
        let dir = tempfile::tempdir().unwrap();
        let engine = open_engine(&dir);
        let telephony = Arc::new(RecordingTelephony { bridges: Mutex::new(Vec::new()) });

        assert!(matches!(
            engine.handoff(telephony.clone()),
            Err(EngineError::Config(_))
        ));

        let mut config = EngineConfig::new(
            dir.path().join("second").to_string_lossy().to_string(),
            Some(test_key_b64()),
        );
        config.handoff_number = Some("+15550009999".to_string());
        let engine = CallEngine::open(config).unwrap();
        engine.sessions().create("call1", Default::default()).await.unwrap();

        engine.handoff(telephony.clone()).unwrap().execute("call1").await.unwrap();
        let bridges = telephony.bridges.lock().unwrap();
        assert_eq!(bridges.as_slice(), &[("call1".to_string(), "+15550009999".to_string())]);
    }
}
