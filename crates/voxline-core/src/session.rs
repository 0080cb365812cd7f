//! Per-call session records with optimistic-concurrency history logging.
//!
//! Each live call owns one flat string-keyed record under
//! `session:{call_id}`. The record is stored as a single JSON blob and every
//! mutation goes through a read-modify-`compare_and_swap` loop: concurrent
//! writers for the same call (turn handler, barge-in controller, escalation
//! monitor) never block each other, a losing writer just redoes its work.
//! Retries are bounded; exhausting them surfaces
//! [`EngineError::WriteConflict`] instead of spinning forever.
//!
//! The `history` and `similar_summaries` fields hold JSON arrays encoded as
//! strings inside the flat map, keeping the record a plain `String -> String`
//! table end to end.

use crate::error::{EngineError, EngineResult};
use crate::semantic::SemanticMemory;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key prefix for session records within the sessions tree.
const SESSION_PREFIX: &str = "session:";

/// Upper bound on read-modify-write retries before a conflict error.
pub const DEFAULT_RETRY_LIMIT: u32 = 32;

/// How many prior-call summaries a new session pulls in.
pub const DEFAULT_SIMILAR_SUMMARIES_LIMIT: usize = 3;

/// Flat string-keyed view of one session record.
pub type SessionFields = BTreeMap<String, String>;

/// One transcript line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub speaker: String,
    pub text: String,
}

impl HistoryEntry {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

fn parse_history(raw: Option<&String>) -> Vec<HistoryEntry> {
    raw.and_then(|s| serde_json::from_str(s).ok()).unwrap_or_default()
}

fn encode_history(entries: &[HistoryEntry]) -> String {
    serde_json::to_string(entries).unwrap_or_default()
}

/// Session store over one sled tree plus the semantic memory collaborator.
#[derive(Clone)]
pub struct SessionStore {
    tree: sled::Tree,
    semantic: Arc<dyn SemanticMemory>,
    similar_limit: usize,
    retry_limit: u32,
}

impl SessionStore {
    pub fn new(
        tree: sled::Tree,
        semantic: Arc<dyn SemanticMemory>,
        similar_limit: usize,
        retry_limit: u32,
    ) -> Self {
        Self {
            tree,
            semantic,
            similar_limit,
            retry_limit,
        }
    }

    fn storage_key(call_id: &str) -> String {
        format!("{}{}", SESSION_PREFIX, call_id)
    }

    fn decode(call_id: &str, raw: &[u8]) -> SessionFields {
        match serde_json::from_slice(raw) {
            Ok(fields) => fields,
            Err(e) => {
                warn!(
                    target: "voxline::sessions",
                    call_id,
                    error = %e,
                    "undecodable session record treated as empty"
                );
                SessionFields::new()
            }
        }
    }

    /// Read-modify-conditional-write loop shared by every mutation.
    ///
    /// The swap is conditional on the exact bytes read at the top of the
    /// attempt, so an interleaved writer makes the swap fail and the whole
    /// cycle (including `f`) reruns against fresh state.
    fn mutate<T>(&self, call_id: &str, f: impl Fn(&mut SessionFields) -> T) -> EngineResult<T> {
        let key = Self::storage_key(call_id);
        for attempt in 1..=self.retry_limit {
            let old = self.tree.get(&key)?;
            let mut fields = match &old {
                Some(raw) => Self::decode(call_id, raw),
                None => SessionFields::new(),
            };
            let result = f(&mut fields);
            let new = serde_json::to_vec(&fields)?;
            match self.tree.compare_and_swap(&key, old.as_ref(), Some(new))? {
                Ok(()) => return Ok(result),
                Err(_) => {
                    debug!(
                        target: "voxline::sessions",
                        call_id,
                        attempt,
                        "session write race lost, retrying"
                    );
                }
            }
        }
        Err(EngineError::WriteConflict {
            call_id: call_id.to_string(),
            attempts: self.retry_limit,
        })
    }

    /// Creates (or re-initializes) a session record.
    ///
    /// When `from` is present, up to `similar_limit` prior summaries for that
    /// caller are pulled from semantic memory and stored under
    /// `similar_summaries`. The lookup is best-effort: a failing or empty
    /// semantic backend never blocks session creation.
    pub async fn create(&self, call_id: &str, mut initial_fields: SessionFields) -> EngineResult<()> {
        if let Some(from) = initial_fields.get("from").cloned() {
            let filter = json!({ "from_number": from });
            match self.semantic.search("", self.similar_limit, Some(&filter)).await {
                Ok(hits) if !hits.is_empty() => {
                    let texts: Vec<&str> = hits.iter().map(|h| h.content.as_str()).collect();
                    initial_fields
                        .insert("similar_summaries".to_string(), serde_json::to_string(&texts)?);
                    debug!(
                        target: "voxline::sessions",
                        call_id,
                        count = texts.len(),
                        "similar summaries attached from prior calls"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        target: "voxline::sessions",
                        call_id,
                        error = %e,
                        "semantic lookup failed; session created without recall"
                    );
                }
            }
        }
        self.mutate(call_id, |fields| {
            for (key, value) in &initial_fields {
                fields.insert(key.clone(), value.clone());
            }
        })?;
        info!(target: "voxline::sessions", call_id, "session created");
        Ok(())
    }

    /// Full field map for a call. A missing record is an empty map, not an
    /// error: the live-call path must survive a cache miss.
    pub fn get(&self, call_id: &str) -> EngineResult<SessionFields> {
        match self.tree.get(Self::storage_key(call_id))? {
            Some(raw) => Ok(Self::decode(call_id, &raw)),
            None => Ok(SessionFields::new()),
        }
    }

    /// Merges fields into the record, leaving unrelated keys alone.
    pub fn update(&self, call_id: &str, updates: SessionFields) -> EngineResult<()> {
        self.mutate(call_id, |fields| {
            for (key, value) in &updates {
                fields.insert(key.clone(), value.clone());
            }
        })
    }

    /// Single-field merge. The barge-in controller uses this for `state`.
    pub fn update_field(&self, call_id: &str, key: &str, value: &str) -> EngineResult<()> {
        self.mutate(call_id, |fields| {
            fields.insert(key.to_string(), value.to_string());
        })
    }

    /// Appends one transcript line. Safe under concurrent callers for the
    /// same call id; returns the new history length.
    pub fn append_history(&self, call_id: &str, speaker: &str, text: &str) -> EngineResult<usize> {
        let entry = HistoryEntry::new(speaker, text);
        let len = self.mutate(call_id, |fields| {
            let mut history = parse_history(fields.get("history"));
            history.push(entry.clone());
            let encoded = encode_history(&history);
            fields.insert("history".to_string(), encoded);
            history.len()
        })?;
        debug!(target: "voxline::sessions", call_id, speaker, len, "history appended");
        Ok(len)
    }

    /// Parsed transcript for a call (empty when absent).
    pub fn history(&self, call_id: &str) -> EngineResult<Vec<HistoryEntry>> {
        let fields = self.get(call_id)?;
        Ok(parse_history(fields.get("history")))
    }

    /// Writes the call summary and upserts it into semantic memory so a later
    /// call from the same number sees it under `similar_summaries`.
    pub async fn set_summary(
        &self,
        call_id: &str,
        text: &str,
        from_number: Option<&str>,
    ) -> EngineResult<()> {
        self.update_field(call_id, "summary", text)?;
        let metadata = match from_number {
            Some(from) => json!({ "from_number": from }),
            None => json!({}),
        };
        self.semantic.add(call_id, text, metadata).await?;
        debug!(target: "voxline::sessions", call_id, "summary stored and indexed");
        Ok(())
    }

    /// Marks the call for human handoff. Monotonic: nothing in this store
    /// ever writes the flag back to false.
    pub fn flag_escalation(&self, call_id: &str) -> EngineResult<()> {
        self.update_field(call_id, "escalation_required", "true")?;
        info!(target: "voxline::sessions", call_id, "escalation flagged for human handoff");
        Ok(())
    }

    pub fn is_escalation_required(&self, call_id: &str) -> EngineResult<bool> {
        Ok(self
            .get(call_id)?
            .get("escalation_required")
            .map(|v| v == "true")
            .unwrap_or(false))
    }

    /// Explicit end-of-life for a session record.
    pub fn delete(&self, call_id: &str) -> EngineResult<bool> {
        let previous = self.tree.remove(Self::storage_key(call_id))?;
        if previous.is_some() {
            debug!(target: "voxline::sessions", call_id, "session deleted");
        }
        Ok(previous.is_some())
    }
}
