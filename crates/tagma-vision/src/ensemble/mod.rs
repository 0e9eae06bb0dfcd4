//! Spatial ensemble detection.

mod aggregator;
mod detector;
mod provider;
mod source;
mod sub_detector;

pub use aggregator::CycleAggregator;
pub use detector::SpatialEnsembleDetector;
pub use provider::{crop_region, LazyModel, ModelLoader, ObjectDetectionProvider};
pub use source::{CycleId, DetectorId, DetectorSource};
pub use sub_detector::{BoundedDetector, Completion, EnsembleMessage};
