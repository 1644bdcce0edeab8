// THEORY:
// This file is the main entry point for the `drowsy_engine` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the
// public API that will be exposed to external consumers (the frame-loop
// application and its view layer).
//
// The primary goal is to export the `DrowsinessEngine` and its associated
// data structures (`EngineConfig`, `StatusView`, the transition and
// aggregation record types) as the clean, high-level interface for the
// engine. The internal modules (`core_modules`) stay encapsulated; consumers
// that need a specific seam (the `AlarmSink` trait, the weekly table) reach
// them through the re-exports below.

pub mod core_modules;
pub mod engine;
pub mod error;

pub use core_modules::aggregation::{HourlyPoint, WeeklyRow, weekly_pivot};
pub use core_modules::alarm::{AlarmController, AlarmSink};
pub use core_modules::event_log::{AlarmStatus, TransitionEvent, TransitionRecord};
pub use core_modules::sample::{BoundingBox, Detection, DetectionSample, Label};
pub use core_modules::sampling_gate::SamplingGate;
pub use core_modules::state_machine::{EngineState, Phase, StateMachine, Transition};
pub use core_modules::weekly_store::WeeklyStore;
pub use engine::{DrowsinessEngine, EngineConfig, SampleOutcome, StatusView, SubjectStatus};
pub use error::{EngineError, PlaybackError, StorageError};
