// THEORY:
// The `sampling_gate` module is the first stage of the engine. Perception
// models running on every frame produce noisy, short-lived "drowsy" spikes
// (a blink reads as closed eyes for a frame or two). Rather than giving the
// state machine per-frame hysteresis logic, the gate simply throttles how
// often raw detections are accepted at all: one sample per interval, the
// rest dropped before they reach the state machine.
//
// The gate is stateless with respect to the rest of the engine. Its only
// state is its own clock (`last_accepted`), and its only side effect is
// advancing that clock on acceptance.

use chrono::{DateTime, Local};
use std::time::Duration;

/// Throttles raw detections to at most one accepted sample per interval.
#[derive(Debug)]
pub struct SamplingGate {
    interval: Duration,
    last_accepted: Option<DateTime<Local>>,
}

impl SamplingGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
        }
    }

    /// Returns true and advances the gate's clock iff at least one full
    /// interval has elapsed since the last accepted sample. The first sample
    /// ever offered is always accepted.
    pub fn accept(&mut self, now: DateTime<Local>) -> bool {
        let due = match self.last_accepted {
            None => true,
            Some(last) => {
                let elapsed = now.signed_duration_since(last);
                elapsed >= chrono::Duration::from_std(self.interval).unwrap_or_default()
            }
        };
        if due {
            self.last_accepted = Some(now);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Local> {
        Local.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn first_sample_is_always_accepted() {
        let mut gate = SamplingGate::new(Duration::from_secs(3));
        assert!(gate.accept(at(0)));
    }

    #[test]
    fn accepts_iff_interval_elapsed() {
        let mut gate = SamplingGate::new(Duration::from_secs(3));
        assert!(gate.accept(at(0)));
        assert!(!gate.accept(at(1)));
        assert!(!gate.accept(at(2)));
        assert!(gate.accept(at(3)));
        assert!(!gate.accept(at(5)));
        assert!(gate.accept(at(6)));
    }

    #[test]
    fn rejected_samples_do_not_advance_the_clock() {
        let mut gate = SamplingGate::new(Duration::from_secs(3));
        assert!(gate.accept(at(0)));
        // A burst of rejected samples must not push the window forward.
        assert!(!gate.accept(at(1)));
        assert!(!gate.accept(at(2)));
        assert!(gate.accept(at(3)));
    }
}
