//! Error types for detection and voting.

use tagma_models::ClassificationParseError;
use thiserror::Error;

use crate::ensemble::{CycleId, DetectorId};

/// Result type for vision operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors that can occur while detecting and compiling results.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Crop failed for {region}: {message}")]
    CropFailure { region: String, message: String },

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Completion from unknown detector {detector} in cycle {cycle}")]
    UnknownDetectorSource { detector: DetectorId, cycle: CycleId },

    #[error("Malformed classification: {0}")]
    MalformedClassification(#[from] ClassificationParseError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

impl VisionError {
    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::ModelUnavailable(message.into())
    }

    pub fn crop_failure(region: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CropFailure {
            region: region.into(),
            message: message.into(),
        }
    }

    pub fn inference_failed(message: impl Into<String>) -> Self {
        Self::InferenceFailed(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn channel_closed(message: impl Into<String>) -> Self {
        Self::ChannelClosed(message.into())
    }

    /// Whether the error signals a broken contract rather than a runtime
    /// condition. Fatal errors stop the ensemble.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VisionError::UnknownDetectorSource { .. } | VisionError::MalformedClassification(_)
        )
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            VisionError::ModelUnavailable(_) => "model_unavailable",
            VisionError::CropFailure { .. } => "crop_failure",
            VisionError::InferenceFailed(_) => "inference_failed",
            VisionError::UnknownDetectorSource { .. } => "unknown_detector_source",
            VisionError::MalformedClassification(_) => "malformed_classification",
            VisionError::InvalidConfig(_) => "invalid_config",
            VisionError::ChannelClosed(_) => "channel_closed",
        }
    }
}
