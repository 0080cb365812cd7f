//! Background job hand-off for work that must leave the hot call path.
//!
//! Transcription, summarization-on-demand, token refresh, notification
//! delivery, and backup/restore all run out-of-band. The job set is a closed
//! enum rather than a name-to-handler table, so a dispatcher that forgets a
//! variant fails to compile instead of failing at dispatch time.

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Work delegated to background processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Job {
    /// Fetch and transcribe a call recording, then store its summary.
    TranscribeRecording { call_id: String, recording_url: String },
    /// Summarize the stored history for a call on demand.
    SummarizeCall { call_id: String },
    /// Run the credential refresh sweep over the token vault.
    RefreshTokens,
    /// Deliver an outbound text message.
    SendSms { to: String, body: String },
    /// Snapshot engine state to an archive path.
    BackupState { destination: String },
    /// Restore engine state from an archive path.
    RestoreState { source: String },
}

impl Job {
    /// Stable name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Job::TranscribeRecording { .. } => "transcribe_recording",
            Job::SummarizeCall { .. } => "summarize_call",
            Job::RefreshTokens => "refresh_tokens",
            Job::SendSms { .. } => "send_sms",
            Job::BackupState { .. } => "backup_state",
            Job::RestoreState { .. } => "restore_state",
        }
    }
}

/// At-least-once job hand-off. `enqueue` returns as soon as the job is
/// accepted; there is no cross-job ordering guarantee, even per call id.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> EngineResult<()>;
}

/// Channel-backed queue for single-process deployments and tests.
pub struct InProcessQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl InProcessQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl JobQueue for InProcessQueue {
    async fn enqueue(&self, job: Job) -> EngineResult<()> {
        debug!(target: "voxline::jobs", job = job.name(), "job enqueued");
        self.tx
            .send(job)
            .map_err(|e| EngineError::JobQueue(e.to_string()))
    }
}
