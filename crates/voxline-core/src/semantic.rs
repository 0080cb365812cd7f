//! Semantic memory trait and local fallback for past-call summaries.
//!
//! Session creation pulls "what did this caller talk about last time" from
//! here, and `set_summary` writes back into it. The real backend is an
//! external vector database behind the [`SemanticMemory`] trait;
//! [`LexicalMemory`] is the in-process fallback used when none is wired and
//! by the test suite.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Result type for semantic memory operations.
pub type SemanticResult<T> = Result<T, SemanticError>;

/// Errors from the semantic memory collaborator.
#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Indexing failed: {0}")]
    IndexingFailed(String),

    #[error("Semantic backend unavailable")]
    Unavailable,
}

/// A similarity hit with relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticHit {
    /// The stored summary text.
    pub content: String,
    /// Relevance score (higher is better; 1.0 for exact-filter recency hits).
    pub score: f32,
    /// Metadata stored alongside the text (e.g. `{"from_number": ...}`).
    pub metadata: serde_json::Value,
}

/// Similarity search over past call summaries.
///
/// Write path: `add` upserts one summary per call id. Read path: `search`
/// with an optional exact-match metadata filter; an empty query means "most
/// recent entries passing the filter."
#[async_trait]
pub trait SemanticMemory: Send + Sync {
    /// Whether the backend is reachable. Callers treat `false` as "skip
    /// enrichment," never as a hard failure.
    async fn is_available(&self) -> bool;

    /// Upserts a summary under `id` (the call id).
    async fn add(&self, id: &str, text: &str, metadata: serde_json::Value) -> SemanticResult<()>;

    /// Returns up to `limit` hits, best first.
    async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: Option<&serde_json::Value>,
    ) -> SemanticResult<Vec<SemanticHit>>;
}

#[derive(Debug, Clone)]
struct StoredSummary {
    text: String,
    metadata: serde_json::Value,
    seq: u64,
}

/// In-process lexical fallback: exact metadata filtering plus token-overlap
/// scoring. No embeddings, no network. Good enough for tests and for running
/// without a vector database.
#[derive(Default)]
pub struct LexicalMemory {
    entries: DashMap<String, StoredSummary>,
    counter: AtomicU64,
}

impl LexicalMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored summaries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn matches_filter(metadata: &serde_json::Value, filter: Option<&serde_json::Value>) -> bool {
        let Some(filter) = filter.and_then(|f| f.as_object()) else {
            return true;
        };
        filter
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }

    fn overlap_score(query_tokens: &HashSet<String>, text: &str) -> f32 {
        if query_tokens.is_empty() {
            return 0.0;
        }
        let text_tokens: HashSet<String> =
            text.to_lowercase().split_whitespace().map(String::from).collect();
        let shared = query_tokens.intersection(&text_tokens).count();
        shared as f32 / query_tokens.len() as f32
    }
}

#[async_trait]
impl SemanticMemory for LexicalMemory {
    async fn is_available(&self) -> bool {
        true
    }

    async fn add(&self, id: &str, text: &str, metadata: serde_json::Value) -> SemanticResult<()> {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            id.to_string(),
            StoredSummary {
                text: text.to_string(),
                metadata,
                seq,
            },
        );
        tracing::debug!(target: "voxline::semantic", id, "summary indexed");
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: Option<&serde_json::Value>,
    ) -> SemanticResult<Vec<SemanticHit>> {
        let query_tokens: HashSet<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(String::from)
            .collect();

        let mut hits: Vec<(u64, SemanticHit)> = self
            .entries
            .iter()
            .filter(|entry| Self::matches_filter(&entry.metadata, filter))
            .filter_map(|entry| {
                let score = if query_tokens.is_empty() {
                    1.0
                } else {
                    Self::overlap_score(&query_tokens, &entry.text)
                };
                if score > 0.0 {
                    Some((
                        entry.seq,
                        SemanticHit {
                            content: entry.text.clone(),
                            score,
                            metadata: entry.metadata.clone(),
                        },
                    ))
                } else {
                    None
                }
            })
            .collect();

        if query_tokens.is_empty() {
            // Recency order for "anything from this caller" lookups
            hits.sort_by(|a, b| b.0.cmp(&a.0));
        } else {
            hits.sort_by(|a, b| {
                b.1.score
                    .partial_cmp(&a.1.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        Ok(hits.into_iter().map(|(_, hit)| hit).take(limit).collect())
    }
}
