//! Speech synthesis and transcription collaborator seams.
//!
//! The barge-in controller only ever issues two commands: stop the bot's
//! mouth, restart its ears. Providers (media-server TTS, streaming STT)
//! implement these; the placeholders log and succeed so the state machine
//! runs end-to-end without any provider wired up.

use crate::error::VoiceResult;
use async_trait::async_trait;
use tracing::info;

/// Bot speech output. `stop` signals the provider and returns; it does not
/// wait for playback to actually drain.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn stop(&self, call_id: &str) -> VoiceResult<()>;
}

/// Caller speech input. `restart` flushes the recognizer so the utterance
/// that interrupted the bot is transcribed from its first syllable.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn restart(&self, call_id: &str) -> VoiceResult<()>;
}

/// Logs instead of talking to a media server.
#[derive(Debug, Default)]
pub struct PlaceholderSynthesizer;

#[async_trait]
impl Synthesizer for PlaceholderSynthesizer {
    async fn stop(&self, call_id: &str) -> VoiceResult<()> {
        info!(target: "voxline::speech", call_id, "placeholder synthesizer stopped");
        Ok(())
    }
}

/// Logs instead of driving a recognizer.
#[derive(Debug, Default)]
pub struct PlaceholderTranscriber;

#[async_trait]
impl Transcriber for PlaceholderTranscriber {
    async fn restart(&self, call_id: &str) -> VoiceResult<()> {
        info!(target: "voxline::speech", call_id, "placeholder transcriber restarted");
        Ok(())
    }
}
