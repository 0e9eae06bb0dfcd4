//! Object detections emitted by the part detection model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::classification::{Classification, ClassificationParseError};
use crate::rect::{FrameSize, NormalizedRect, Point};

/// Unvalidated inference output for one object, as produced by the model
/// execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawDetection {
    /// Bounding box in normalized coordinates [0, 1]
    pub bbox: NormalizedRect,
    /// Top label reported by the model
    pub label: String,
    /// Detection confidence [0, 1]
    pub confidence: f64,
}

impl RawDetection {
    pub fn new(bbox: NormalizedRect, label: impl Into<String>, confidence: f64) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
        }
    }
}

/// Detected part with bounding box and classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    /// Bounding box in normalized coordinates [0, 1]
    bbox: NormalizedRect,
    pub classification: Classification,
    /// Detection confidence [0, 1]
    pub confidence: f64,
}

impl Detection {
    pub fn new(bbox: NormalizedRect, classification: Classification, confidence: f64) -> Self {
        Self {
            bbox,
            classification,
            confidence,
        }
    }

    /// Validate a raw detection against the closed classification set.
    pub fn from_raw(raw: &RawDetection) -> Result<Self, ClassificationParseError> {
        let classification = Classification::from_raw_label(&raw.label)?;
        Ok(Self::new(raw.bbox, classification, raw.confidence))
    }

    pub fn bbox(&self) -> &NormalizedRect {
        &self.bbox
    }

    /// Get the center point in normalized coordinates.
    pub fn center(&self) -> Point {
        self.bbox.center()
    }

    /// Center point in pixel space for the given frame.
    pub fn denormalized_center(&self, frame: FrameSize) -> Point {
        self.bbox.center().denormalize(frame)
    }

    /// Rescale the bounding box from sub-region-local coordinates into the
    /// sub-region's rectangle within the full frame.
    ///
    /// This is the only mutation a detection supports.
    pub fn rescale_into(&mut self, region: &NormalizedRect) {
        self.bbox = self.bbox.remap_into(region);
    }
}
