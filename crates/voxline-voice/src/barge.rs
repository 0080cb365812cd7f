//! Barge-in control: the caller's right to interrupt the bot mid-sentence.
//!
//! One controller per call sits between the playback path (start/end of bot
//! speech) and the audio-ingest path (inbound caller chunks). Those two paths
//! run concurrently, so the speaking flag is an atomic and the
//! speaking-to-listening handover is a single compare-exchange: exactly one
//! path wins it, and only the winner fires the stop/restart side effects.

use crate::error::{VoiceError, VoiceResult};
use crate::silence::{SilenceDetector, ZeroAmplitudeDetector};
use crate::speech::{Synthesizer, Transcriber};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use voxline_core::SessionStore;

const IDLE: u8 = 0;
const SPEAKING: u8 = 1;
const LISTENING: u8 = 2;

/// Events emitted by the barge-in controller
#[derive(Debug, Clone)]
pub enum BargeEvent {
    /// Bot speech playback started
    SpeechStarted { timestamp: DateTime<Utc> },

    /// Bot speech playback ran to completion
    SpeechEnded { timestamp: DateTime<Utc> },

    /// Caller spoke over the bot; playback for this call must be cancelled
    Interrupted { timestamp: DateTime<Utc> },
}

/// Per-call speech state machine: idle, speaking, listening.
///
/// `start_speech`/`end_speech` belong to the playback path, `process_audio`
/// to the ingest path. The controller never blocks one path on the other and
/// never waits for the synthesizer to drain.
pub struct BargeInController {
    call_id: String,
    sessions: SessionStore,
    synthesizer: Arc<dyn Synthesizer>,
    transcriber: Arc<dyn Transcriber>,
    silence: Arc<dyn SilenceDetector>,
    state: AtomicU8,
    event_tx: mpsc::UnboundedSender<BargeEvent>,
}

impl BargeInController {
    /// Create a controller for one call with the stock silence detector.
    pub fn new(
        call_id: impl Into<String>,
        sessions: SessionStore,
        synthesizer: Arc<dyn Synthesizer>,
        transcriber: Arc<dyn Transcriber>,
    ) -> (Self, mpsc::UnboundedReceiver<BargeEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let controller = Self {
            call_id: call_id.into(),
            sessions,
            synthesizer,
            transcriber,
            silence: Arc::new(ZeroAmplitudeDetector),
            state: AtomicU8::new(IDLE),
            event_tx,
        };

        (controller, event_rx)
    }

    /// Swap in a different silence detector (e.g. an energy-threshold VAD).
    pub fn with_silence_detector(mut self, silence: Arc<dyn SilenceDetector>) -> Self {
        self.silence = silence;
        self
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Bot playback is starting: any state moves to speaking.
    pub fn start_speech(&self) -> VoiceResult<()> {
        self.state.store(SPEAKING, Ordering::Release);
        self.sessions.update_field(&self.call_id, "state", "speaking")?;
        debug!(target: "voxline::barge", call_id = %self.call_id, "🔊 bot speech started");
        self.emit_event(BargeEvent::SpeechStarted { timestamp: Utc::now() })
    }

    /// Bot playback finished on its own: speaking moves to listening.
    ///
    /// A no-op outside `speaking`; when a barge-in won the handover first,
    /// the interrupt already did this transition.
    pub fn end_speech(&self) -> VoiceResult<()> {
        if self
            .state
            .compare_exchange(SPEAKING, LISTENING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        self.sessions.update_field(&self.call_id, "state", "listening")?;
        debug!(target: "voxline::barge", call_id = %self.call_id, "🤫 bot speech ended");
        self.emit_event(BargeEvent::SpeechEnded { timestamp: Utc::now() })
    }

    /// Inbound caller audio while the bot may be talking.
    ///
    /// Returns `true` when this chunk interrupted bot speech. Silence is a
    /// no-op, as is any chunk outside the `speaking` state. On a genuine
    /// interrupt every follow-up step (synthesizer stop, transcriber restart,
    /// state persistence, event emission) is best-effort: the audio path
    /// must keep flowing even when a collaborator is down.
    pub async fn process_audio(&self, chunk: &[u8]) -> bool {
        if self.silence.is_silence(chunk) {
            return false;
        }
        if self
            .state
            .compare_exchange(SPEAKING, LISTENING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        info!(
            target: "voxline::barge",
            call_id = %self.call_id,
            "⚡ barge-in: caller speaking, silencing bot output"
        );

        if let Err(e) = self.synthesizer.stop(&self.call_id).await {
            warn!(
                target: "voxline::barge",
                call_id = %self.call_id,
                error = %e,
                "synthesizer stop failed during barge-in"
            );
        }
        if let Err(e) = self.transcriber.restart(&self.call_id).await {
            warn!(
                target: "voxline::barge",
                call_id = %self.call_id,
                error = %e,
                "transcriber restart failed during barge-in"
            );
        }
        if let Err(e) = self.sessions.update_field(&self.call_id, "state", "listening") {
            warn!(
                target: "voxline::barge",
                call_id = %self.call_id,
                error = %e,
                "session state write failed during barge-in"
            );
        }
        if let Err(e) = self.emit_event(BargeEvent::Interrupted { timestamp: Utc::now() }) {
            debug!(
                target: "voxline::barge",
                call_id = %self.call_id,
                error = %e,
                "no listener for barge-in events"
            );
        }
        true
    }

    /// Get the current state (for testing/debugging)
    pub fn state(&self) -> &'static str {
        match self.state.load(Ordering::Acquire) {
            SPEAKING => "speaking",
            LISTENING => "listening",
            _ => "idle",
        }
    }

    /// Emit an event to the channel
    fn emit_event(&self, event: BargeEvent) -> VoiceResult<()> {
        self.event_tx
            .send(event)
            .map_err(|e| VoiceError::ChannelSend(e.to_string()))
    }
}
