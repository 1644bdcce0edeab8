// THEORY:
// The `alarm` module owns the lifecycle of the looping alarm sound. The
// detection loop must never block on audio I/O, so playback runs on its own
// tokio task; the only cross-context interaction is an idempotent start/stop
// pair signalled over a watch channel.
//
// Key architectural principles:
// 1.  **One playback context at a time**: `start_episode` is a no-op while a
//     context is active, and replaces a stale one only after signalling it
//     and waiting (bounded) for it to wind down. `stop_episode` is a no-op
//     when nothing is playing.
// 2.  **Backend behind a seam**: the concrete audio backend is out of scope;
//     the controller talks to an `AlarmSink` with simple play/stop
//     primitives. Backends must tolerate redundant `end_loop` calls.
// 3.  **Degrade, never corrupt**: a backend failure marks the alarm stopped
//     and is reported; the state machine is untouched and the next confirmed
//     episode retries playback.

use crate::error::PlaybackError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Play/stop primitives of the external audio backend.
///
/// `begin_loop` starts looping playback and returns once playback is
/// running; `end_loop` halts sound output and may be called redundantly.
pub trait AlarmSink: Send + Sync + 'static {
    fn begin_loop(&self) -> Result<(), PlaybackError>;
    fn end_loop(&self);
}

/// Handle to the single live playback context.
struct Playback {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    /// True while the task is between a successful `begin_loop` and its
    /// matching `end_loop` (or spawn and a failed `begin_loop`).
    active: Arc<AtomicBool>,
}

/// Starts the alarm exactly once per confirmed drowsy episode and stops it
/// exactly once per recovery. Safe to invoke redundantly from the primary
/// loop while the playback task is running or shutting down.
pub struct AlarmController<S: AlarmSink> {
    sink: Arc<S>,
    playback: Option<Playback>,
    stop_wait: Duration,
}

impl<S: AlarmSink> AlarmController<S> {
    pub fn new(sink: S, stop_wait: Duration) -> Self {
        Self {
            sink: Arc::new(sink),
            playback: None,
            stop_wait,
        }
    }

    /// Whether a playback context is currently live.
    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| p.active.load(Ordering::Acquire) && !p.task.is_finished())
    }

    /// Starts looping playback on a fresh task. No-op if already playing.
    pub async fn start_episode(&mut self) {
        if self.is_playing() {
            return;
        }

        // A previous context may still be winding down (or dead after a
        // backend failure); clear it before starting fresh.
        if let Some(stale) = self.playback.take() {
            Self::retire(stale, self.stop_wait).await;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let active = Arc::new(AtomicBool::new(true));
        let task_active = Arc::clone(&active);
        let sink = Arc::clone(&self.sink);

        let task = tokio::spawn(async move {
            if let Err(err) = sink.begin_loop() {
                warn!(error = %err, "alarm playback failed; continuing without audio");
                task_active.store(false, Ordering::Release);
                return;
            }
            debug!("alarm playback started");
            // Park until the stop signal arrives; a dropped sender counts
            // as a stop so the sink is always released.
            while !*stop_rx.borrow() {
                if stop_rx.changed().await.is_err() {
                    break;
                }
            }
            sink.end_loop();
            task_active.store(false, Ordering::Release);
            debug!("alarm playback stopped");
        });

        self.playback = Some(Playback {
            stop_tx,
            task,
            active,
        });
    }

    /// Signals the playback context to halt and waits (bounded) for it.
    /// No-op if nothing is playing.
    pub async fn stop_episode(&mut self) {
        if let Some(playback) = self.playback.take() {
            Self::retire(playback, self.stop_wait).await;
        }
    }

    async fn retire(playback: Playback, stop_wait: Duration) {
        let _ = playback.stop_tx.send(true);
        let abort = playback.task.abort_handle();
        if timeout(stop_wait, playback.task).await.is_err() {
            warn!("alarm playback did not stop within {stop_wait:?}; aborting task");
            abort.abort();
        }
    }
}
