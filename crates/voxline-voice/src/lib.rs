//! # voxline-voice: real-time barge-in control
//!
//! Lets a caller interrupt the bot mid-sentence. One controller per call
//! coordinates the playback path and the audio-ingest path over an atomic
//! state machine, so an interrupt fires its side effects exactly once.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     BargeInController                        │
//! │  playback path                     audio-ingest path         │
//! │  start_speech / end_speech         process_audio(chunk)      │
//! │        │                                 │                   │
//! │        └────────► AtomicU8 state ◄───────┘                   │
//! │             idle / speaking / listening                      │
//! │        winner of speaking→listening fires:                   │
//! │        synthesizer.stop, transcriber.restart,                │
//! │        session state=listening, Interrupted event            │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod barge;
pub mod error;
pub mod silence;
pub mod speech;

pub use barge::{BargeEvent, BargeInController};
pub use error::{VoiceError, VoiceResult};
pub use silence::{SilenceDetector, ZeroAmplitudeDetector};
pub use speech::{PlaceholderSynthesizer, PlaceholderTranscriber, Synthesizer, Transcriber};
