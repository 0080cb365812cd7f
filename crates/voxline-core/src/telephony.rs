//! Telephony collaborators and the human-handoff sequence.
//!
//! The engine never talks to a telephony provider directly; it asks the
//! [`Telephony`] trait to bridge a call or send a text and moves on. The
//! handoff sequence mirrors the call router's escalate step: text the waiting
//! human a summary, then bridge the caller over.

use crate::error::EngineResult;
use crate::session::SessionStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Handoff note used when a call has no stored summary.
const FALLBACK_SUMMARY: &str = "Caller requested a human agent.";

/// Provider seam for call control and messaging. Fire-and-forget: the engine
/// does not wait for delivery or for the far end to answer.
#[async_trait]
pub trait Telephony: Send + Sync {
    /// Bridge an in-progress call to another number.
    async fn bridge_call(&self, call_id: &str, destination: &str) -> EngineResult<()>;

    /// Send a text message.
    async fn send_sms(&self, to: &str, body: &str) -> EngineResult<()>;
}

/// Drives the handoff once a call is flagged for escalation.
pub struct HandoffCoordinator {
    sessions: SessionStore,
    telephony: Arc<dyn Telephony>,
    handoff_number: String,
    notify_number: Option<String>,
}

impl HandoffCoordinator {
    pub fn new(
        sessions: SessionStore,
        telephony: Arc<dyn Telephony>,
        handoff_number: String,
        notify_number: Option<String>,
    ) -> Self {
        Self {
            sessions,
            telephony,
            handoff_number,
            notify_number,
        }
    }

    /// Notify the human (best-effort), then bridge the caller.
    ///
    /// The notification SMS failing is logged and swallowed; a bridge failure
    /// propagates so the call router can fall back to a scripted utterance.
    pub async fn execute(&self, call_id: &str) -> EngineResult<()> {
        let summary = self
            .sessions
            .get(call_id)?
            .get("summary")
            .cloned()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_SUMMARY.to_string());

        if let Some(notify) = &self.notify_number {
            let body = format!("Escalated call {}: {}", call_id, summary);
            if let Err(e) = self.telephony.send_sms(notify, &body).await {
                warn!(
                    target: "voxline::telephony",
                    call_id,
                    error = %e,
                    "handoff notification SMS failed"
                );
            }
        }

        self.telephony.bridge_call(call_id, &self.handoff_number).await?;
        info!(
            target: "voxline::telephony",
            call_id,
            destination = %self.handoff_number,
            "call bridged to human"
        );
        Ok(())
    }
}
