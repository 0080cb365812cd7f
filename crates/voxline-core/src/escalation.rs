//! Escalation detection: keyword scan, durable flag, handoff summary.
//!
//! Every user utterance passes through [`EscalationMonitor::check_and_flag`].
//! On a keyword hit the per-call escalation flag is set FIRST, then the full
//! history is summarized for the human taking over. The ordering is the
//! contract: a broken summarizer degrades the handoff note, never the
//! escalation itself.

use crate::error::EngineResult;
use crate::session::{HistoryEntry, SessionStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Stock keyword set; deployments override via configuration.
pub const DEFAULT_ESCALATION_KEYWORDS: [&str; 5] =
    ["help", "human", "representative", "operator", "emergency"];

/// Case-insensitive substring match against a keyword set.
pub fn contains_keyword(text: &str, keywords: &[String]) -> bool {
    let lowered = text.to_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

/// Condenses a call transcript into a handoff note. External collaborator;
/// the engine ships [`TruncationSummarizer`] as the placeholder default.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, history: &[HistoryEntry]) -> EngineResult<String>;
}

/// First-N-words summarizer, the original placeholder kept as default wiring
/// until an LLM summarizer sits behind the same trait.
pub struct TruncationSummarizer {
    max_words: usize,
}

impl TruncationSummarizer {
    pub fn new(max_words: usize) -> Self {
        Self { max_words }
    }
}

impl Default for TruncationSummarizer {
    fn default() -> Self {
        Self::new(30)
    }
}

#[async_trait]
impl Summarizer for TruncationSummarizer {
    async fn summarize(&self, history: &[HistoryEntry]) -> EngineResult<String> {
        let text = history
            .iter()
            .map(|entry| entry.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let words: Vec<&str> = text.split_whitespace().collect();
        let cut = words.len().min(self.max_words);
        Ok(words[..cut].join(" "))
    }
}

/// Keyword detector plus handoff summarization, one per engine.
pub struct EscalationMonitor {
    keywords: Vec<String>,
    summarizer: Arc<dyn Summarizer>,
}

impl EscalationMonitor {
    /// Keywords are lowercased once here; empty entries are dropped.
    pub fn new(keywords: Vec<String>, summarizer: Arc<dyn Summarizer>) -> Self {
        let keywords = keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords, summarizer }
    }

    pub fn with_default_keywords(summarizer: Arc<dyn Summarizer>) -> Self {
        Self::new(
            DEFAULT_ESCALATION_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            summarizer,
        )
    }

    pub fn contains_keyword(&self, text: &str) -> bool {
        contains_keyword(text, &self.keywords)
    }

    /// Scans one utterance; on a match, flags the call and produces the
    /// handoff summary. Returns whether escalation triggered.
    ///
    /// The flag write happens before summarization and its failure
    /// propagates; everything after is best-effort.
    pub async fn check_and_flag(
        &self,
        sessions: &SessionStore,
        call_id: &str,
        text: &str,
    ) -> EngineResult<bool> {
        if !self.contains_keyword(text) {
            return Ok(false);
        }
        sessions.flag_escalation(call_id)?;
        info!(target: "voxline::escalation", call_id, "escalation keyword matched");

        if let Err(e) = self.summarize_for_handoff(sessions, call_id).await {
            warn!(
                target: "voxline::escalation",
                call_id,
                error = %e,
                "handoff summary failed; escalation flag already set"
            );
        }
        Ok(true)
    }

    async fn summarize_for_handoff(&self, sessions: &SessionStore, call_id: &str) -> EngineResult<()> {
        let history = sessions.history(call_id)?;
        let summary = self.summarizer.summarize(&history).await?;
        let from = sessions.get(call_id)?.get("from").cloned();
        sessions.set_summary(call_id, &summary, from.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::semantic::LexicalMemory;
    use crate::session::{DEFAULT_RETRY_LIMIT, DEFAULT_SIMILAR_SUMMARIES_LIMIT};

    fn open_store() -> (SessionStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = sled::open(dir.path()).expect("open sled");
        let tree = db.open_tree("sessions").expect("open tree");
        (
            SessionStore::new(
                tree,
                Arc::new(LexicalMemory::new()),
                DEFAULT_SIMILAR_SUMMARIES_LIMIT,
                DEFAULT_RETRY_LIMIT,
            ),
            dir,
        )
    }

    fn default_monitor() -> EscalationMonitor {
        EscalationMonitor::with_default_keywords(Arc::new(TruncationSummarizer::default()))
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        async fn summarize(&self, _: &[HistoryEntry]) -> EngineResult<String> {
            Err(EngineError::Config("summarizer offline".into()))
        }
    }

    #[test]
    fn keyword_match_is_case_insensitive_substring() {
        let monitor = default_monitor();
        assert!(monitor.contains_keyword("I need a HUMAN please"));
        assert!(monitor.contains_keyword("get me an operator now"));
        assert!(monitor.contains_keyword("this is an Emergency!"));
        assert!(!monitor.contains_keyword("everything is fine thanks"));
    }

    #[test]
    fn custom_keywords_replace_defaults() {
        let monitor = EscalationMonitor::new(
            vec!["supervisor".to_string(), "  ".to_string()],
            Arc::new(TruncationSummarizer::default()),
        );
        assert!(monitor.contains_keyword("let me talk to a Supervisor"));
        assert!(!monitor.contains_keyword("I need a human"), "defaults are gone");
    }

    #[tokio::test]
    async fn check_and_flag_sets_flag_and_summary() {
        let (store, _dir) = open_store();
        store.append_history("call1", "user", "hello").unwrap();
        store.append_history("call1", "user", "I need a human operator").unwrap();

        let monitor = default_monitor();
        let triggered = monitor
            .check_and_flag(&store, "call1", "I need a human operator")
            .await
            .unwrap();

        assert!(triggered);
        assert!(store.is_escalation_required("call1").unwrap());
        let summary = store.get("call1").unwrap().get("summary").cloned().expect("summary written");
        assert!(summary.contains("hello"));
    }

    #[tokio::test]
    async fn no_keyword_means_no_flag() {
        let (store, _dir) = open_store();
        let monitor = default_monitor();

        let triggered = monitor
            .check_and_flag(&store, "call1", "what time do you open")
            .await
            .unwrap();

        assert!(!triggered);
        assert!(!store.is_escalation_required("call1").unwrap());
    }

    #[tokio::test]
    async fn flag_survives_failing_summarizer() {
        let (store, _dir) = open_store();
        let monitor = EscalationMonitor::with_default_keywords(Arc::new(FailingSummarizer));

        let triggered = monitor
            .check_and_flag(&store, "call1", "emergency, I need help")
            .await
            .unwrap();

        assert!(triggered, "escalation must report success despite the summarizer");
        assert!(store.is_escalation_required("call1").unwrap());
        assert!(store.get("call1").unwrap().get("summary").is_none());
    }

    #[tokio::test]
    async fn flag_stays_set_after_calm_followup() {
        let (store, _dir) = open_store();
        let monitor = default_monitor();

        assert!(monitor.check_and_flag(&store, "call1", "I want a representative").await.unwrap());
        assert!(!monitor.check_and_flag(&store, "call1", "thanks, that worked").await.unwrap());
        assert!(
            store.is_escalation_required("call1").unwrap(),
            "flag is monotonic across later calm turns"
        );
    }

    #[tokio::test]
    async fn truncation_summarizer_caps_word_count() {
        let summarizer = TruncationSummarizer::default();
        let long_text = (0..50).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ");
        let history = vec![HistoryEntry::new("user", long_text)];

        let summary = summarizer.summarize(&history).await.unwrap();
        assert_eq!(summary.split_whitespace().count(), 30);
        assert!(summary.starts_with("word0 word1"));
    }
}
