// THEORY:
// The `engine` module is the final, top-level API for the drowsiness engine.
// It encapsulates the full stack into a single interface: the sampling gate,
// the duration-threshold state machine, the alarm controller, the transition
// log, and the aggregation pipeline, wired in the order the data flows.
//
// Key architectural principles:
// 1.  **Single-writer orchestration**: one primary loop calls `on_sample`
//     (or `on_detections`); all engine state is owned here and mutated
//     sequentially. Only alarm playback runs on its own task.
// 2.  **Transitions drive everything**: the state machine emits at most one
//     transition per sample, and this layer translates it into alarm
//     lifecycle calls, log appends, and aggregation appends. No component
//     reaches into another.
// 3.  **Degrade locally**: playback failures leave detection running;
//     storage failures leave the in-memory accumulators intact. The caller
//     sees honest `Result`s, never a silently corrupted engine.

use crate::core_modules::aggregation::{AggregationStore, HourlyPoint, WeeklyRow};
use crate::core_modules::alarm::{AlarmController, AlarmSink};
use crate::core_modules::event_log::{EventLog, TransitionRecord};
use crate::core_modules::sample::{Detection, DetectionSample, Label};
use crate::core_modules::sampling_gate::SamplingGate;
use crate::core_modules::state_machine::{EngineState, Phase, StateMachine, Transition};
use crate::core_modules::weekly_store::WeeklyStore;
use crate::error::EngineError;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::sample::BoundingBox;

const DEFAULT_SAMPLING_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_DURATION_THRESHOLD: Duration = Duration::from_secs(5);
const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.75;
const DEFAULT_CONFIDENCE_CEILING: f64 = 1.00;
const DEFAULT_ALARM_STOP_WAIT: Duration = Duration::from_secs(1);

/// Configuration for the DrowsinessEngine, allowing for tunable behavior.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum spacing between accepted samples. Detections arriving faster
    /// are dropped so a blink never reads as drowsiness.
    pub sampling_interval: Duration,
    /// How long a drowsy episode must persist before it is confirmed.
    pub duration_threshold: Duration,
    /// A `Drowsy` detection counts toward an episode only with confidence in
    /// `[confidence_floor, confidence_ceiling]`.
    pub confidence_floor: f64,
    pub confidence_ceiling: f64,
    /// Bounded wait for a playback context to wind down on stop.
    pub alarm_stop_wait: Duration,
    /// Where the durable weekly table lives.
    pub weekly_table_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sampling_interval: DEFAULT_SAMPLING_INTERVAL,
            duration_threshold: DEFAULT_DURATION_THRESHOLD,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            confidence_ceiling: DEFAULT_CONFIDENCE_CEILING,
            alarm_stop_wait: DEFAULT_ALARM_STOP_WAIT,
            weekly_table_path: PathBuf::from("weekly_data.csv"),
        }
    }
}

/// Subject status as the display layer shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectStatus {
    Awake,
    Drowsy,
    Yawning,
}

impl SubjectStatus {
    fn from_label(label: Label) -> Self {
        match label {
            Label::Awake => SubjectStatus::Awake,
            Label::Drowsy => SubjectStatus::Drowsy,
            Label::Yawn => SubjectStatus::Yawning,
        }
    }

    /// Overlay color (RGB) for this status.
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            SubjectStatus::Awake => (0, 255, 0),
            SubjectStatus::Drowsy => (255, 0, 0),
            SubjectStatus::Yawning => (255, 165, 0),
        }
    }
}

/// Read-only view for the display layer: status, alarm state, and progress
/// toward the duration threshold while an episode is open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusView {
    /// `None` until the first accepted sample.
    pub status: Option<SubjectStatus>,
    pub phase: Phase,
    pub threshold_progress: Option<f64>,
    pub episode_duration: Option<Duration>,
    pub alarm_sounding: bool,
}

/// The primary output of the engine for a single offered sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// The frame contained no detections; nothing changed.
    NoDetections,
    /// The sampling gate dropped the sample; nothing changed.
    Throttled,
    /// The sample was accepted, with the transition it produced, if any.
    Accepted { transition: Option<Transition> },
}

/// The main, top-level struct for the drowsiness engine.
pub struct DrowsinessEngine<S: AlarmSink> {
    config: EngineConfig,
    gate: SamplingGate,
    machine: StateMachine,
    alarm: AlarmController<S>,
    event_log: EventLog,
    aggregation: AggregationStore,
    weekly_store: WeeklyStore,
    last_status: Option<SubjectStatus>,
}

impl<S: AlarmSink> DrowsinessEngine<S> {
    pub fn new(config: EngineConfig, sink: S) -> Self {
        let gate = SamplingGate::new(config.sampling_interval);
        let machine = StateMachine::new(
            config.duration_threshold,
            config.confidence_floor,
            config.confidence_ceiling,
        );
        let alarm = AlarmController::new(sink, config.alarm_stop_wait);
        let weekly_store = WeeklyStore::new(config.weekly_table_path.clone());
        Self {
            config,
            gate,
            machine,
            alarm,
            event_log: EventLog::new(),
            aggregation: AggregationStore::new(),
            weekly_store,
            last_status: None,
        }
    }

    /// Feeds one frame's worth of raw detections: the highest-confidence
    /// detection wins, is validated, and goes through the gate. An empty
    /// frame leaves all state untouched.
    pub async fn on_detections(
        &mut self,
        detections: &[Detection],
        observed_at: DateTime<Local>,
    ) -> Result<SampleOutcome, EngineError> {
        let Some(best) = detections.iter().max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        }) else {
            return Ok(SampleOutcome::NoDetections);
        };

        let sample = DetectionSample::new(best.label, best.confidence, observed_at)?;
        Ok(self.on_sample(sample).await)
    }

    /// Feeds one validated sample through the gate and the state machine,
    /// then dispatches whatever transition falls out.
    pub async fn on_sample(&mut self, sample: DetectionSample) -> SampleOutcome {
        if !self.gate.accept(sample.observed_at) {
            return SampleOutcome::Throttled;
        }

        self.last_status = Some(SubjectStatus::from_label(sample.label));
        let transition = self.machine.on_sample(&sample);
        if let Some(transition) = transition {
            self.dispatch(transition).await;
        }
        SampleOutcome::Accepted { transition }
    }

    async fn dispatch(&mut self, transition: Transition) {
        match transition {
            Transition::EnteredDrowsy { .. } => {}
            Transition::ConfirmedAsleep {
                at,
                episode_start,
                confidence,
                duration,
            } => {
                self.event_log.record_slept(at);
                self.aggregation.append_hourly(confidence, duration);
                self.aggregation.append_weekly(confidence, episode_start);
                self.alarm.start_episode().await;
            }
            Transition::ConfirmedAwake { at } => {
                self.event_log.record_woke(at);
                self.alarm.stop_episode().await;
            }
        }
    }

    /// The display layer's view of the engine.
    pub fn status(&self) -> StatusView {
        let state = self.machine.state();
        StatusView {
            status: self.last_status,
            phase: state.current,
            threshold_progress: self.machine.threshold_progress(),
            episode_duration: state.episode_duration,
            alarm_sounding: self.alarm.is_playing(),
        }
    }

    pub fn engine_state(&self) -> EngineState {
        self.machine.state()
    }

    /// Immutable copy of the transition log, safe to render while the
    /// primary loop keeps appending.
    pub fn transition_log(&self) -> Vec<TransitionRecord> {
        self.event_log.snapshot()
    }

    pub fn hourly_points(&self) -> Vec<HourlyPoint> {
        self.aggregation.read_hourly()
    }

    pub fn weekly_rows(&self) -> Vec<WeeklyRow> {
        self.aggregation.read_weekly()
    }

    /// Reads the durable weekly table, creating it (header only) if absent.
    pub fn load_persisted_weekly(&self) -> Result<Vec<WeeklyRow>, EngineError> {
        Ok(self.weekly_store.load()?)
    }

    /// Seeds the weekly accumulator from the durable table, for callers that
    /// want cross-session accumulation. Returns the number of rows loaded.
    pub fn seed_weekly_from_store(&mut self) -> Result<usize, EngineError> {
        let rows = self.weekly_store.load()?;
        let count = rows.len();
        self.aggregation.seed_weekly(rows);
        Ok(count)
    }

    /// Atomic reset: stops the alarm, returns the state machine to `Awake`,
    /// and empties the transition log and both session accumulators.
    pub async fn clear_logs(&mut self) {
        self.alarm.stop_episode().await;
        self.machine.reset();
        self.event_log.clear();
        self.aggregation.clear();
        self.last_status = None;
        info!("report logs cleared");
    }

    /// Ends the session: stops the alarm and rewrites the durable weekly
    /// table from the in-memory accumulator. A storage failure leaves the
    /// accumulator intact, so nothing is lost except the flush itself.
    pub async fn finalize_session(&mut self) -> Result<(), EngineError> {
        self.alarm.stop_episode().await;
        let rows = self.aggregation.read_weekly();
        if let Err(err) = self.weekly_store.store(&rows) {
            warn!(error = %err, "weekly table flush failed; in-memory data retained");
            return Err(err.into());
        }
        info!(
            rows = rows.len(),
            path = %self.weekly_store.path().display(),
            "weekly table flushed"
        );
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::alarm::AlarmSink;
    use crate::core_modules::event_log::TransitionEvent;
    use crate::error::PlaybackError;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        begins: AtomicUsize,
        ends: AtomicUsize,
    }

    impl CountingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                begins: AtomicUsize::new(0),
                ends: AtomicUsize::new(0),
            })
        }
    }

    impl AlarmSink for Arc<CountingSink> {
        fn begin_loop(&self) -> Result<(), PlaybackError> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn end_loop(&self) {
            self.ends.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn at(secs: i64) -> DateTime<Local> {
        Local.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn sample(label: Label, confidence: f64, secs: i64) -> DetectionSample {
        DetectionSample::new(label, confidence, at(secs)).unwrap()
    }

    fn engine_with(sink: Arc<CountingSink>, dir: &std::path::Path) -> DrowsinessEngine<Arc<CountingSink>> {
        let config = EngineConfig {
            weekly_table_path: dir.join("weekly_data.csv"),
            ..EngineConfig::default()
        };
        DrowsinessEngine::new(config, sink)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn sustained_drowsiness_confirms_logs_and_alarms() {
        // Scenario A: three drowsy samples at t=0, 3, 6 with a 3 s gate and
        // a 5 s threshold confirm at t=6.
        let sink = CountingSink::new();
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_with(Arc::clone(&sink), dir.path());

        assert!(matches!(
            engine.on_sample(sample(Label::Drowsy, 0.80, 0)).await,
            SampleOutcome::Accepted {
                transition: Some(Transition::EnteredDrowsy { .. })
            }
        ));
        assert_eq!(engine.engine_state().current, Phase::DrowsyPending);

        engine.on_sample(sample(Label::Drowsy, 0.85, 3)).await;
        engine.on_sample(sample(Label::Drowsy, 0.90, 6)).await;
        settle().await;

        assert_eq!(engine.engine_state().current, Phase::AlarmActive);
        assert!(engine.status().alarm_sounding);
        assert_eq!(sink.begins.load(Ordering::SeqCst), 1);

        let log = engine.transition_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].event, TransitionEvent::SleptAlarmOn);

        let hourly = engine.hourly_points();
        assert_eq!(hourly.len(), 1);
        assert_eq!(hourly[0].confidence, 0.90);
        assert!((hourly[0].minute_marker - 0.1).abs() < 1e-9);
        assert_eq!(engine.weekly_rows().len(), 1);
    }

    #[tokio::test]
    async fn interrupted_episode_produces_no_log_entry() {
        // Scenario B: an awake sample at t=3 discards the pending episode.
        let sink = CountingSink::new();
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_with(Arc::clone(&sink), dir.path());

        engine.on_sample(sample(Label::Drowsy, 0.80, 0)).await;
        engine.on_sample(sample(Label::Awake, 0.85, 3)).await;
        engine.on_sample(sample(Label::Drowsy, 0.90, 6)).await;

        assert_eq!(engine.engine_state().current, Phase::DrowsyPending);
        assert!(engine.transition_log().is_empty());
        assert!(engine.hourly_points().is_empty());
        assert_eq!(sink.begins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn recovery_stops_alarm_and_logs_woke() {
        // Scenario C: after confirmation, an awake sample at t=9 recovers.
        let sink = CountingSink::new();
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_with(Arc::clone(&sink), dir.path());

        engine.on_sample(sample(Label::Drowsy, 0.80, 0)).await;
        engine.on_sample(sample(Label::Drowsy, 0.85, 3)).await;
        engine.on_sample(sample(Label::Drowsy, 0.90, 6)).await;
        settle().await;
        engine.on_sample(sample(Label::Awake, 0.95, 9)).await;

        assert_eq!(engine.engine_state().current, Phase::Awake);
        assert_eq!(engine.engine_state().episode_start, None);
        assert!(!engine.status().alarm_sounding);
        assert_eq!(sink.ends.load(Ordering::SeqCst), 1);

        let log = engine.transition_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].event, TransitionEvent::WokeAlarmOff);
    }

    #[tokio::test]
    async fn gate_throttles_between_intervals() {
        let sink = CountingSink::new();
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_with(sink, dir.path());

        assert!(matches!(
            engine.on_sample(sample(Label::Drowsy, 0.80, 0)).await,
            SampleOutcome::Accepted { .. }
        ));
        // A high-confidence awake sample between intervals is ignored
        // regardless of content, so the pending episode survives.
        assert_eq!(
            engine.on_sample(sample(Label::Awake, 0.99, 1)).await,
            SampleOutcome::Throttled
        );
        assert_eq!(engine.engine_state().current, Phase::DrowsyPending);
    }

    #[tokio::test]
    async fn highest_confidence_detection_wins_the_frame() {
        let sink = CountingSink::new();
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_with(sink, dir.path());

        let boxed = |label, confidence| Detection {
            label,
            confidence,
            bounding_box: BoundingBox {
                x1: 0,
                y1: 0,
                x2: 10,
                y2: 10,
            },
        };
        let outcome = engine
            .on_detections(
                &[boxed(Label::Awake, 0.40), boxed(Label::Drowsy, 0.88)],
                at(0),
            )
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            SampleOutcome::Accepted {
                transition: Some(Transition::EnteredDrowsy { .. })
            }
        ));
    }

    #[tokio::test]
    async fn empty_frame_changes_nothing() {
        let sink = CountingSink::new();
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_with(sink, dir.path());

        engine.on_sample(sample(Label::Drowsy, 0.80, 0)).await;
        let outcome = engine.on_detections(&[], at(3)).await.unwrap();
        assert_eq!(outcome, SampleOutcome::NoDetections);
        assert_eq!(engine.engine_state().current, Phase::DrowsyPending);
    }

    #[tokio::test]
    async fn malformed_detection_is_rejected_without_touching_state() {
        let sink = CountingSink::new();
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_with(sink, dir.path());

        let bad = Detection {
            label: Label::Drowsy,
            confidence: 1.7,
            bounding_box: BoundingBox {
                x1: 0,
                y1: 0,
                x2: 10,
                y2: 10,
            },
        };
        let err = engine.on_detections(&[bad], at(0)).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidSample(_)));
        assert_eq!(engine.engine_state().current, Phase::Awake);
    }

    #[tokio::test]
    async fn clear_logs_is_an_atomic_reset() {
        let sink = CountingSink::new();
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_with(Arc::clone(&sink), dir.path());

        engine.on_sample(sample(Label::Drowsy, 0.80, 0)).await;
        engine.on_sample(sample(Label::Drowsy, 0.85, 6)).await;
        settle().await;
        assert!(engine.status().alarm_sounding);

        engine.clear_logs().await;

        assert!(!engine.status().alarm_sounding);
        assert_eq!(sink.ends.load(Ordering::SeqCst), 1);
        assert_eq!(engine.engine_state().current, Phase::Awake);
        assert!(engine.transition_log().is_empty());
        assert!(engine.hourly_points().is_empty());
        assert!(engine.weekly_rows().is_empty());
    }

    #[tokio::test]
    async fn finalize_flushes_weekly_table_and_stops_alarm() {
        let sink = CountingSink::new();
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_with(Arc::clone(&sink), dir.path());

        engine.on_sample(sample(Label::Drowsy, 0.80, 0)).await;
        engine.on_sample(sample(Label::Drowsy, 0.85, 6)).await;
        settle().await;

        engine.finalize_session().await.unwrap();
        assert!(!engine.status().alarm_sounding);

        let persisted = engine.load_persisted_weekly().unwrap();
        assert_eq!(persisted, engine.weekly_rows());
        assert_eq!(persisted.len(), 1);
    }

    #[tokio::test]
    async fn seeding_from_store_enables_cross_session_accumulation() {
        let sink = CountingSink::new();
        let dir = tempfile::tempdir().unwrap();

        {
            let mut engine = engine_with(Arc::clone(&sink), dir.path());
            engine.on_sample(sample(Label::Drowsy, 0.80, 0)).await;
            engine.on_sample(sample(Label::Drowsy, 0.85, 6)).await;
            engine.finalize_session().await.unwrap();
        }

        let mut next_session = engine_with(sink, dir.path());
        assert_eq!(next_session.seed_weekly_from_store().unwrap(), 1);
        next_session.on_sample(sample(Label::Drowsy, 0.90, 100)).await;
        next_session.on_sample(sample(Label::Drowsy, 0.90, 106)).await;
        next_session.finalize_session().await.unwrap();

        assert_eq!(next_session.load_persisted_weekly().unwrap().len(), 2);
    }
}
