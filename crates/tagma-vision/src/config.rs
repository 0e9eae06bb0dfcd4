//! Configuration for detection and temporal voting.

use serde::{Deserialize, Serialize};
use tagma_models::FrameSize;

use crate::error::{VisionError, VisionResult};

/// Sliding-window voting parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Maximum frames buffered before a result is published (default: 8)
    pub window_size: usize,
    /// Frames a classification must appear in to be accepted (default: 3)
    pub vote_threshold: usize,
    /// Frames that must show a complete structure (default: 3)
    pub completion_threshold: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            window_size: 8,
            vote_threshold: 3,
            completion_threshold: 3,
        }
    }
}

impl CompilerConfig {
    /// Longer window with a stricter vote, for slow-moving scenes.
    pub fn conservative() -> Self {
        Self {
            window_size: 10,
            vote_threshold: 4,
            completion_threshold: 4,
        }
    }

    pub fn validate(&self) -> VisionResult<()> {
        if self.window_size == 0 {
            return Err(VisionError::invalid_config("window_size must be at least 1"));
        }
        if self.vote_threshold == 0 {
            return Err(VisionError::invalid_config("vote_threshold must be at least 1"));
        }
        if self.completion_threshold == 0 {
            return Err(VisionError::invalid_config(
                "completion_threshold must be at least 1",
            ));
        }
        if self.vote_threshold > self.window_size {
            return Err(VisionError::invalid_config(format!(
                "vote_threshold ({}) exceeds window_size ({})",
                self.vote_threshold, self.window_size
            )));
        }
        if self.completion_threshold > self.window_size {
            return Err(VisionError::invalid_config(format!(
                "completion_threshold ({}) exceeds window_size ({})",
                self.completion_threshold, self.window_size
            )));
        }
        Ok(())
    }
}

/// Configuration for the detection pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    // === Voting ===
    pub compiler: CompilerConfig,

    // === Spatial Ensemble ===
    /// Fraction of frame width/height covered by each quadrant crop (default: 0.6)
    pub quadrant_overlap: f64,

    /// In-flight inferences allowed per sub-detector (default: 4)
    pub max_concurrent_inference: usize,

    /// Capacity of the merged-set output channel (default: 16)
    pub output_capacity: usize,

    // === Proximity ===
    /// Joint-to-part distance in pixels at `reference_resolution` (default: 80)
    pub reference_distance: f64,

    /// Resolution `reference_distance` was calibrated at (default: 504x896)
    pub reference_resolution: FrameSize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            compiler: CompilerConfig::default(),

            quadrant_overlap: 0.6,
            max_concurrent_inference: 4,
            output_capacity: 16,

            reference_distance: 80.0,
            reference_resolution: FrameSize::new(504, 896),
        }
    }
}

impl DetectionConfig {
    pub fn with_compiler(mut self, compiler: CompilerConfig) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn validate(&self) -> VisionResult<()> {
        self.compiler.validate()?;

        // Quadrants must cover at least half the frame so their union is the
        // whole frame.
        if !(0.5..=1.0).contains(&self.quadrant_overlap) {
            return Err(VisionError::invalid_config(format!(
                "quadrant_overlap must be within [0.5, 1.0], got {}",
                self.quadrant_overlap
            )));
        }
        if self.max_concurrent_inference == 0 {
            return Err(VisionError::invalid_config(
                "max_concurrent_inference must be at least 1",
            ));
        }
        if self.output_capacity == 0 {
            return Err(VisionError::invalid_config("output_capacity must be at least 1"));
        }
        if self.reference_distance.is_nan() || self.reference_distance <= 0.0 {
            return Err(VisionError::invalid_config(
                "reference_distance must be positive",
            ));
        }
        if self.reference_resolution.width == 0 || self.reference_resolution.height == 0 {
            return Err(VisionError::invalid_config(
                "reference_resolution must be non-empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(DetectionConfig::default().validate().is_ok());
        assert!(CompilerConfig::conservative().validate().is_ok());
    }

    #[test]
    fn test_vote_threshold_bounded_by_window() {
        let config = CompilerConfig {
            window_size: 4,
            vote_threshold: 5,
            completion_threshold: 1,
        };
        assert!(matches!(config.validate(), Err(VisionError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_thresholds_rejected() {
        let config = CompilerConfig {
            vote_threshold: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CompilerConfig {
            completion_threshold: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overlap_bounds() {
        let config = DetectionConfig {
            quadrant_overlap: 0.4,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DetectionConfig {
            quadrant_overlap: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
