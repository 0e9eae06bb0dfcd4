//! Shared data models for tagma detection.
//!
//! This crate provides Serde-serializable types for:
//! - The closed set of recognizable part classifications
//! - Normalized rectangles and points
//! - Raw and validated object detections
//! - Hand pose detections and their holding joints
//! - Per-frame held results and per-window compiled results

pub mod classification;
pub mod detection;
pub mod hand;
pub mod rect;
pub mod results;

// Re-export common types
pub use classification::{Classification, ClassificationParseError};
pub use detection::{Detection, RawDetection};
pub use hand::{
    Chirality, GestureParseError, HandDetection, HandDetectionOutcome, HandGesture,
    HandGestureLabel, JointName, JointPosition, HOLDING_JOINTS,
};
pub use rect::{FrameSize, NormalizedRect, Point};
pub use results::{ClassificationSet, CompiledResult, HeldResult};
