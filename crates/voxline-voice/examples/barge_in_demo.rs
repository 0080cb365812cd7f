//! Example: Barge-In Demo
//!
//! Simulates one bot turn on a live call: the bot starts speaking, silence
//! chunks flow by harmlessly, then the caller talks over it. The interrupt
//! stops synthesis, the utterance trips the escalation monitor, and the
//! session record carries the whole story.

use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use voxline_core::{CallEngine, EngineConfig};
use voxline_voice::{BargeEvent, BargeInController, PlaceholderSynthesizer, PlaceholderTranscriber};

/// Demo-only vault key (16 zero bytes). NOT for production.
const DEMO_KEY: &str = "AAAAAAAAAAAAAAAAAAAAAA==";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🎤 Voxline Barge-In Demo");
    info!("========================");
    info!("");

    let token_key =
        std::env::var("VOXLINE__TOKEN_KEY").unwrap_or_else(|_| DEMO_KEY.to_string());
    let config = EngineConfig::new("./data/voxline_demo", Some(token_key));
    let engine = CallEngine::open(config)?;

    let call_id = "demo-call-1";
    engine
        .sessions()
        .create(
            call_id,
            [
                ("from".to_string(), "+15551230000".to_string()),
                ("to".to_string(), "+15557770000".to_string()),
            ]
            .into(),
        )
        .await?;

    let (controller, mut events) = BargeInController::new(
        call_id,
        engine.sessions().clone(),
        Arc::new(PlaceholderSynthesizer),
        Arc::new(PlaceholderTranscriber),
    );

    // Bot starts its answer.
    controller.start_speech()?;
    info!("state: {}", controller.state());

    // Line noise while the caller listens.
    for _ in 0..3 {
        let interrupted = controller.process_audio(&[0u8; 320]).await;
        assert!(!interrupted);
    }
    info!("silence chunks ignored, still {}", controller.state());

    // The caller talks over the bot.
    let interrupted = controller.process_audio(b"actual caller audio").await;
    info!("speech chunk interrupted playback: {}", interrupted);
    info!("state: {}", controller.state());

    // The interrupting utterance comes back from transcription.
    let utterance = "stop, I need a human";
    engine.sessions().append_history(call_id, "caller", utterance)?;
    let escalated = engine.check_turn(call_id, utterance).await?;
    info!("escalation triggered: {}", escalated);

    let record = engine.sessions().get(call_id)?;
    info!("session record:");
    for (key, value) in &record {
        info!("   {} = {}", key, value);
    }

    while let Ok(event) = events.try_recv() {
        match event {
            BargeEvent::SpeechStarted { timestamp } => {
                info!("🔊 speech started at {}", timestamp);
            }
            BargeEvent::SpeechEnded { timestamp } => {
                info!("🤫 speech ended at {}", timestamp);
            }
            BargeEvent::Interrupted { timestamp } => {
                info!("⚡ interrupted at {}", timestamp);
            }
        }
    }

    engine.flush()?;
    info!("👋 Goodbye!");

    Ok(())
}
