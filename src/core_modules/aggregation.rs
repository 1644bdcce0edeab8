// THEORY:
// The `aggregation` module holds the two accumulators fed by confirmed
// drowsy episodes, for later visualization:
//
// 1.  The **hourly** list is ephemeral, one point per confirmed episode in
//     the current session, cleared only by an explicit reset. Its x value is
//     the episode duration in minutes (fractional) — the literal data the
//     original report carried; what the axis means is the consumer's call.
// 2.  The **weekly** table is durable across sessions and keyed by the
//     episode start: day of week, hour of day, and week number. It is
//     flushed to storage on session finalize, not per append, so episodes
//     never cost an I/O round trip.
//
// Both sides are single-writer (the primary loop); reads hand out owned
// snapshots. The mean-confidence pivot the heatmap consumer needs is
// provided here so the read-side contract stays testable: missing
// (hour, day) combinations are absent, never zero-filled.

use chrono::{DateTime, Datelike, Local, Timelike, Weekday};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// One confirmed episode in the current session's running log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlyPoint {
    pub confidence: f64,
    /// Episode duration in minutes, fractional.
    pub minute_marker: f64,
}

/// One confirmed episode in the durable weekly table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyRow {
    pub confidence: f64,
    pub day: Weekday,
    pub hour: u32,
    /// `%W`-style week number of the episode start, kept as written.
    pub week: String,
}

/// Canonical full day name, the capitalization the persisted table uses.
pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Parses a full day name, case-insensitively.
pub fn parse_day(name: &str) -> Option<Weekday> {
    match name.to_ascii_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Mean confidence per `(hour, day)` slot. Slots with no episodes are
/// absent from the map.
pub fn weekly_pivot(rows: &[WeeklyRow]) -> HashMap<(u32, Weekday), f64> {
    let mut sums: HashMap<(u32, Weekday), (f64, u32)> = HashMap::new();
    for row in rows {
        let slot = sums.entry((row.hour, row.day)).or_insert((0.0, 0));
        slot.0 += row.confidence;
        slot.1 += 1;
    }
    sums.into_iter()
        .map(|(key, (sum, count))| (key, sum / count as f64))
        .collect()
}

/// The session's two episode accumulators.
#[derive(Debug, Default)]
pub struct AggregationStore {
    hourly: Vec<HourlyPoint>,
    weekly: Vec<WeeklyRow>,
}

impl AggregationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one point to the ephemeral session list.
    pub fn append_hourly(&mut self, confidence: f64, episode_duration: Duration) {
        self.hourly.push(HourlyPoint {
            confidence,
            minute_marker: episode_duration.as_secs_f64() / 60.0,
        });
    }

    /// Appends one row to the weekly accumulator; the episode start supplies
    /// day, hour, and week number.
    pub fn append_weekly(&mut self, confidence: f64, episode_start: DateTime<Local>) {
        self.weekly.push(WeeklyRow {
            confidence,
            day: episode_start.weekday(),
            hour: episode_start.hour(),
            week: episode_start.format("%W").to_string(),
        });
    }

    /// Seeds the weekly accumulator from persisted rows, for callers that
    /// want cross-session accumulation.
    pub fn seed_weekly(&mut self, rows: Vec<WeeklyRow>) {
        self.weekly = rows;
    }

    pub fn read_hourly(&self) -> Vec<HourlyPoint> {
        self.hourly.clone()
    }

    pub fn read_weekly(&self) -> Vec<WeeklyRow> {
        self.weekly.clone()
    }

    pub fn clear(&mut self) {
        self.hourly.clear();
        self.weekly.clear();
    }
}
