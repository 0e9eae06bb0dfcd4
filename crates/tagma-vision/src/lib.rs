//! Detection fusion and temporal voting for tagma assembly.
//!
//! This crate provides:
//! - Spatial ensemble detection over a full frame and four overlapping quadrants
//! - Weighted merging of per-classification detections
//! - Bounded hand pose dispatch
//! - Hand-to-part proximity association
//! - Geometric structural completion checks
//! - A sliding-window temporal compiler with early abandon

pub mod compiler;
pub mod completion;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod frame_set;
pub mod hand;
pub mod metrics;
pub mod proximity;

pub use compiler::TemporalCompiler;
pub use completion::StructuralCompletionEvaluator;
pub use config::{CompilerConfig, DetectionConfig};
pub use ensemble::{
    crop_region, CycleId, DetectorId, DetectorSource, LazyModel, ModelLoader,
    ObjectDetectionProvider, SpatialEnsembleDetector,
};
pub use error::{VisionError, VisionResult};
pub use frame_set::FrameDetectionSet;
pub use hand::{HandDetector, HandPoseProvider, SequencedHands};
pub use proximity::ProximityAssociator;
