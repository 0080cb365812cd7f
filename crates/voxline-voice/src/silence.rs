//! Silence detection over raw audio chunks.
//!
//! The stock detector answers one question only: is this chunk empty or
//! all-zero bytes? That is a wire-level stand-in, not voice activity
//! detection. Real VAD (energy windows, model-based endpointing) plugs in
//! behind the same trait without touching the barge-in controller.

/// Decides whether an inbound audio chunk counts as silence.
pub trait SilenceDetector: Send + Sync {
    fn is_silence(&self, chunk: &[u8]) -> bool;
}

/// Empty or all-zero bytes are silence; any other byte is speech.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroAmplitudeDetector;

impl SilenceDetector for ZeroAmplitudeDetector {
    fn is_silence(&self, chunk: &[u8]) -> bool {
        chunk.is_empty() || chunk.iter().all(|b| *b == 0)
    }
}
