// THEORY:
// The `state_machine` module is the heart of the engine. It converts the
// gated stream of `(label, confidence, timestamp)` samples into a small
// number of high-level transitions using a sustained-duration rule: a single
// drowsy sample means nothing, a drowsy episode that persists past the
// duration threshold means the subject fell asleep.
//
// Key architectural principles:
// 1.  **One machine, one clock**: every duration in the engine is derived
//     here, from the timestamps on accepted samples, never from arrival
//     time. There is exactly one confirmation per episode.
// 2.  **Explicit state object**: `EngineState` is an ordinary value owned by
//     the machine, handed out by copy for display. No ambient globals.
// 3.  **Transitions as data**: the machine emits at most one `Transition`
//     per sample. The orchestration layer decides what a transition means
//     for the alarm, the log, and the aggregation sinks; the machine itself
//     has no side effects beyond its own state.

use crate::core_modules::sample::{DetectionSample, Label};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// The three phases of a drowsiness episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// No open episode.
    Awake,
    /// A drowsy episode is open but has not yet reached the threshold.
    DrowsyPending,
    /// The episode reached the threshold; the alarm should be sounding.
    AlarmActive,
}

/// Snapshot of the machine's mutable state.
///
/// Invariant: `episode_start` and `episode_duration` are `Some` iff
/// `current != Awake`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineState {
    pub current: Phase,
    pub episode_start: Option<DateTime<Local>>,
    pub episode_duration: Option<Duration>,
}

impl EngineState {
    fn awake() -> Self {
        Self {
            current: Phase::Awake,
            episode_start: None,
            episode_duration: None,
        }
    }
}

/// A confirmed change in the subject's state, emitted at most once per
/// sample and consumed by the alarm controller, the event log, and the
/// aggregation store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// A drowsy episode opened. Display-only; nothing is logged yet.
    EnteredDrowsy { at: DateTime<Local> },
    /// The open episode reached the duration threshold.
    ConfirmedAsleep {
        at: DateTime<Local>,
        episode_start: DateTime<Local>,
        confidence: f64,
        duration: Duration,
    },
    /// The subject recovered after a confirmed episode.
    ConfirmedAwake { at: DateTime<Local> },
}

/// The duration-threshold state machine.
pub struct StateMachine {
    state: EngineState,
    duration_threshold: Duration,
    confidence_floor: f64,
    confidence_ceiling: f64,
}

impl StateMachine {
    pub fn new(duration_threshold: Duration, confidence_floor: f64, confidence_ceiling: f64) -> Self {
        Self {
            state: EngineState::awake(),
            duration_threshold,
            confidence_floor,
            confidence_ceiling,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Fraction of the duration threshold covered by the open episode, for
    /// the display layer's progress bar. `None` while awake.
    pub fn threshold_progress(&self) -> Option<f64> {
        let elapsed = self.state.episode_duration?;
        Some((elapsed.as_secs_f64() / self.duration_threshold.as_secs_f64()).min(1.0))
    }

    /// Drops any open episode and returns to `Awake` without emitting.
    /// Used by the engine's atomic reset.
    pub fn reset(&mut self) {
        self.state = EngineState::awake();
    }

    /// Advances the machine with one accepted sample.
    pub fn on_sample(&mut self, sample: &DetectionSample) -> Option<Transition> {
        let counts_as_drowsy = sample.label == Label::Drowsy
            && sample.confidence >= self.confidence_floor
            && sample.confidence <= self.confidence_ceiling;

        match self.state.current {
            Phase::Awake => {
                if counts_as_drowsy {
                    self.state = EngineState {
                        current: Phase::DrowsyPending,
                        episode_start: Some(sample.observed_at),
                        episode_duration: Some(Duration::ZERO),
                    };
                    debug!(at = %sample.observed_at, confidence = sample.confidence, "drowsy episode opened");
                    return Some(Transition::EnteredDrowsy {
                        at: sample.observed_at,
                    });
                }
                None
            }
            Phase::DrowsyPending => {
                if counts_as_drowsy {
                    let start = self.state.episode_start?;
                    let elapsed = elapsed_between(start, sample.observed_at);
                    self.state.episode_duration = Some(elapsed);
                    if elapsed >= self.duration_threshold {
                        self.state.current = Phase::AlarmActive;
                        info!(
                            at = %sample.observed_at,
                            duration_secs = elapsed.as_secs_f64(),
                            "drowsiness confirmed"
                        );
                        return Some(Transition::ConfirmedAsleep {
                            at: sample.observed_at,
                            episode_start: start,
                            confidence: sample.confidence,
                            duration: elapsed,
                        });
                    }
                    None
                } else {
                    // A false start: the episode never reached the threshold,
                    // so it produces no log entry and no alarm.
                    debug!(at = %sample.observed_at, "drowsy episode discarded before threshold");
                    self.state = EngineState::awake();
                    None
                }
            }
            Phase::AlarmActive => {
                if counts_as_drowsy {
                    // Duration keeps accumulating for the progress display,
                    // but no further transitions are produced.
                    if let Some(start) = self.state.episode_start {
                        self.state.episode_duration =
                            Some(elapsed_between(start, sample.observed_at));
                    }
                    None
                } else {
                    self.state = EngineState::awake();
                    info!(at = %sample.observed_at, "subject recovered");
                    Some(Transition::ConfirmedAwake {
                        at: sample.observed_at,
                    })
                }
            }
        }
    }
}

/// Wall-clock seconds between two sample timestamps, clamped at zero.
fn elapsed_between(start: DateTime<Local>, now: DateTime<Local>) -> Duration {
    now.signed_duration_since(start)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
