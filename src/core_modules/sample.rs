// THEORY:
// The `sample` module is the boundary between the external perception module
// and the engine. The perception side hands over raw detections: a class
// name, a confidence score, and a bounding box. This module turns that raw
// material into a validated `DetectionSample` that the rest of the engine can
// trust unconditionally.
//
// Key architectural principles:
// 1.  **Validate once, trust everywhere**: `DetectionSample::new` is the only
//     constructor, and it rejects out-of-range confidences and unknown class
//     names with `InvalidSample`. Downstream modules never re-check.
// 2.  **Geometry is carried, not consumed**: the bounding box travels with a
//     `Detection` for the display layer's overlays, but the core engine only
//     reads the label, the confidence, and the timestamp.

use crate::error::EngineError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// The classification labels produced by the perception module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Awake,
    Drowsy,
    /// Cosmetic for the display layer; never starts or sustains an episode.
    Yawn,
}

impl Label {
    /// Parses a perception-module class name. Unknown names are an
    /// `InvalidSample` error rather than a silent default.
    pub fn parse(name: &str) -> Result<Self, EngineError> {
        match name.to_ascii_lowercase().as_str() {
            "awake" => Ok(Label::Awake),
            "drowsy" => Ok(Label::Drowsy),
            "yawn" => Ok(Label::Yawn),
            other => Err(EngineError::InvalidSample(format!(
                "unknown class name: {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Awake => write!(f, "awake"),
            Label::Drowsy => write!(f, "drowsy"),
            Label::Yawn => write!(f, "yawn"),
        }
    }
}

/// Pixel-space bounding box of a detection. Unused by the core engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

/// One raw detection from the perception module, as produced per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: Label,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

/// A validated classification sample: the engine's unit of input.
///
/// Immutable; exactly one per accepted sample. `observed_at` is the wall
/// clock at observation time and is what every duration computation in the
/// engine uses, not the arrival time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionSample {
    pub label: Label,
    pub confidence: f64,
    pub observed_at: DateTime<Local>,
}

impl DetectionSample {
    /// Builds a sample, rejecting confidences outside `[0, 1]`.
    pub fn new(
        label: Label,
        confidence: f64,
        observed_at: DateTime<Local>,
    ) -> Result<Self, EngineError> {
        if !(0.0..=1.0).contains(&confidence) || confidence.is_nan() {
            return Err(EngineError::InvalidSample(format!(
                "confidence {confidence} outside [0, 1]"
            )));
        }
        Ok(Self {
            label,
            confidence,
            observed_at,
        })
    }
}
