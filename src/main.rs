// This file is an example of how to drive the `drowsy_engine` library.
// The main library entry point is `src/lib.rs`.

use chrono::Local;
use drowsy_engine::{
    AlarmSink, DetectionSample, DrowsinessEngine, EngineConfig, Label, PlaybackError,
};

/// Stand-in for a real audio backend: logs instead of playing sound.
struct LoggingSink;

impl AlarmSink for LoggingSink {
    fn begin_loop(&self) -> Result<(), PlaybackError> {
        println!("** ALARM ON **");
        Ok(())
    }

    fn end_loop(&self) {
        println!("** alarm off **");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();
    println!("Drowsy Engine - Example Runner");

    // In a real application the samples come from the perception module and
    // the sink wraps the platform audio backend. Here we replay a canned
    // drowsy episode through the engine.
    let mut engine = DrowsinessEngine::new(EngineConfig::default(), LoggingSink);

    let now = Local::now();
    let script = [
        (Label::Awake, 0.95, 0),
        (Label::Drowsy, 0.80, 3),
        (Label::Drowsy, 0.85, 6),
        (Label::Drowsy, 0.90, 11),
        (Label::Awake, 0.97, 14),
    ];
    for (label, confidence, offset) in script {
        let observed_at = now + chrono::Duration::seconds(offset);
        match DetectionSample::new(label, confidence, observed_at) {
            Ok(sample) => {
                let outcome = engine.on_sample(sample).await;
                println!("{label} @ +{offset}s -> {outcome:?}");
            }
            Err(err) => eprintln!("dropped sample: {err}"),
        }
    }

    for record in engine.transition_log() {
        println!(
            "{}  {}  alarm {:?}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.event.message(),
            record.alarm_status
        );
    }

    if let Err(err) = engine.finalize_session().await {
        eprintln!("session finalize failed: {err}");
    }
}
