// THEORY:
// The `error` module defines the single failure taxonomy for the engine.
// Every fallible path in the crate funnels into one of these variants, so a
// caller can make a policy decision (drop the sample, retry, notify the
// operator) without inspecting strings.
//
// Key architectural principles:
// 1.  **Locality**: Each variant belongs to exactly one component. A failure
//     in one component never corrupts another component's invariants; the
//     variants exist so the orchestration layer can degrade the right
//     subsystem and keep the rest running.
// 2.  **Honesty**: User-visible failures are reported, never silently
//     swallowed. Playback and storage errors are logged at the point of
//     degradation and carried in the `Result` for the caller.

use thiserror::Error;

/// A failure raised by the alarm playback backend.
///
/// The controller treats any playback failure as "alarm stopped": the engine
/// keeps detecting, and the next confirmed episode retries playback.
#[derive(Debug, Clone, Error)]
#[error("alarm playback failed: {reason}")]
pub struct PlaybackError {
    pub reason: String,
}

impl PlaybackError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A failure reading or writing the durable weekly table.
///
/// In-memory aggregation is unaffected by these; only persistence is
/// delayed or failed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("weekly table I/O failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed weekly table row {line}: {reason}")]
    MalformedRow { line: usize, reason: String },
}

/// The top-level error type for the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The sample was malformed (confidence outside `[0, 1]` or an unknown
    /// class name). The sample is dropped and `EngineState` is untouched.
    #[error("invalid sample: {0}")]
    InvalidSample(String),

    /// The audio backend failed. The alarm is considered stopped and
    /// detection continues.
    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// The weekly table could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An upstream capture failure, propagated for the caller. The engine
    /// itself never raises this; it exists so frame-loop callers share one
    /// error type without touching `EngineState`.
    #[error("capture failed: {0}")]
    Capture(String),
}
