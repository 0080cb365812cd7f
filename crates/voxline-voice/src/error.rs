//! Error types for the voxline voice layer

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur in the barge-in layer
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Synthesizer error: {0}")]
    Synthesis(String),

    #[error("Transcriber error: {0}")]
    Transcription(String),

    #[error("Session state error: {0}")]
    Session(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),
}

impl From<voxline_core::EngineError> for VoiceError {
    fn from(err: voxline_core::EngineError) -> Self {
        VoiceError::Session(err.to_string())
    }
}
