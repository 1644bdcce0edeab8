// THEORY:
// The `event_log` module is the engine's discrete history: one immutable
// record per confirmed transition ("slept" / "woke up"), in append order,
// which is also chronological order. The view layer renders this as the
// detection report table.
//
// Reads hand out owned snapshots, never references into the live vector, so
// a concurrently rendering view can hold a copy while the primary loop keeps
// appending.

use chrono::{DateTime, Local};
use serde::Serialize;

/// What a transition record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransitionEvent {
    SleptAlarmOn,
    WokeAlarmOff,
}

impl TransitionEvent {
    /// The report-column phrasing used by the display layer.
    pub fn message(&self) -> &'static str {
        match self {
            TransitionEvent::SleptAlarmOn => "You slept!",
            TransitionEvent::WokeAlarmOff => "You woke up!",
        }
    }
}

/// Alarm state at the moment the record was appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlarmStatus {
    On,
    Off,
}

/// One immutable row of the transition log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransitionRecord {
    pub timestamp: DateTime<Local>,
    pub event: TransitionEvent,
    pub alarm_status: AlarmStatus,
}

/// Append-only log of confirmed state transitions.
#[derive(Debug, Default)]
pub struct EventLog {
    records: Vec<TransitionRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the "fell asleep" record for a confirmed episode.
    pub fn record_slept(&mut self, timestamp: DateTime<Local>) {
        self.records.push(TransitionRecord {
            timestamp,
            event: TransitionEvent::SleptAlarmOn,
            alarm_status: AlarmStatus::On,
        });
    }

    /// Appends the "woke up" record for a confirmed recovery.
    pub fn record_woke(&mut self, timestamp: DateTime<Local>) {
        self.records.push(TransitionRecord {
            timestamp,
            event: TransitionEvent::WokeAlarmOff,
            alarm_status: AlarmStatus::Off,
        });
    }

    /// An owned, immutable copy of the log in append order.
    pub fn snapshot(&self) -> Vec<TransitionRecord> {
        self.records.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
