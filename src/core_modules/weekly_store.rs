// THEORY:
// The `weekly_store` module is the durable side of the aggregation pipeline:
// a row-oriented table on disk holding one row per confirmed episode,
// `Drowsiness,Day,Hour,Week`, with a header row. The visualization layer
// reads it back in bulk to rebuild its in-memory table on demand.
//
// Contract details that matter:
// - The file is created with just the header before the first read if it
//   does not exist yet.
// - On session finalize the full in-memory accumulator is rewritten
//   (overwrite, not append-only growth across sessions).
// - Day names are normalized to canonical capitalization on read; malformed
//   rows are a `StorageError`, not silent drops, so the operator learns the
//   table is damaged.
// - Storage failures never touch the in-memory accumulators; only
//   persistence is delayed or failed.

use crate::core_modules::aggregation::{WeeklyRow, day_name, parse_day};
use crate::error::StorageError;
use std::fs;
use std::path::{Path, PathBuf};

const HEADER: &str = "Drowsiness,Day,Hour,Week";

/// The persisted weekly table.
#[derive(Debug, Clone)]
pub struct WeeklyStore {
    path: PathBuf,
}

impl WeeklyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    /// Creates the table with only the header row if it does not exist.
    pub fn ensure_exists(&self) -> Result<(), StorageError> {
        if !self.path.exists() {
            fs::write(&self.path, format!("{HEADER}\n")).map_err(|e| self.io_error(e))?;
        }
        Ok(())
    }

    /// Reads the full table back, creating it first if absent.
    pub fn load(&self) -> Result<Vec<WeeklyRow>, StorageError> {
        self.ensure_exists()?;
        let contents = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;

        let mut rows = Vec::new();
        for (index, line) in contents.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            rows.push(parse_row(line, index + 1)?);
        }
        Ok(rows)
    }

    /// Rewrites the whole table from the given rows, header included.
    pub fn store(&self, rows: &[WeeklyRow]) -> Result<(), StorageError> {
        let mut out = String::with_capacity(HEADER.len() + 1 + rows.len() * 24);
        out.push_str(HEADER);
        out.push('\n');
        for row in rows {
            out.push_str(&format!(
                "{},{},{},{}\n",
                row.confidence,
                day_name(row.day),
                row.hour,
                row.week
            ));
        }
        fs::write(&self.path, out).map_err(|e| self.io_error(e))
    }
}

fn parse_row(line: &str, line_number: usize) -> Result<WeeklyRow, StorageError> {
    let malformed = |reason: String| StorageError::MalformedRow {
        line: line_number,
        reason,
    };

    let fields: Vec<&str> = line.split(',').collect();
    let [confidence, day, hour, week] = fields.as_slice() else {
        return Err(malformed(format!(
            "expected 4 fields, found {}",
            fields.len()
        )));
    };

    let confidence: f64 = confidence
        .trim()
        .parse()
        .map_err(|_| malformed(format!("bad confidence: {confidence:?}")))?;
    let day = parse_day(day.trim()).ok_or_else(|| malformed(format!("bad day name: {day:?}")))?;
    let hour: u32 = hour
        .trim()
        .parse()
        .map_err(|_| malformed(format!("bad hour: {hour:?}")))?;
    if hour > 23 {
        return Err(malformed(format!("hour {hour} outside 0..=23")));
    }

    Ok(WeeklyRow {
        confidence,
        day,
        hour,
        week: week.trim().to_string(),
    })
}
