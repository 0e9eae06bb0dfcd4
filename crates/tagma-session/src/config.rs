//! Session configuration.

use std::str::FromStr;
use tagma_models::FrameSize;
use tagma_vision::{CompilerConfig, DetectionConfig};

use crate::error::{SessionError, SessionResult};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Colored human-readable output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(SessionError::config_error(format!("unknown log format: {other}"))),
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Detection and voting parameters
    pub detection: DetectionConfig,
    /// Run the ensemble on every nth captured frame
    pub prediction_interval: u64,
    /// In-flight hand pose inferences
    pub max_hand_inference: usize,
    /// Capacity of the hand outcome channel
    pub hand_capacity: usize,
    /// Capacity of the compiled result channel
    pub results_capacity: usize,
    /// Capacity of the command channel
    pub command_capacity: usize,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            prediction_interval: 6,
            max_hand_inference: 4,
            hand_capacity: 8,
            results_capacity: 16,
            command_capacity: 8,
            log_format: LogFormat::Pretty,
        }
    }
}

impl SessionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup. Missing or unparsable
    /// values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let base = DetectionConfig::default();

        fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
            lookup(key).and_then(|s| s.parse().ok()).unwrap_or(default)
        }

        let compiler = CompilerConfig {
            window_size: parse(&lookup, "TAGMA_WINDOW_SIZE", base.compiler.window_size),
            vote_threshold: parse(&lookup, "TAGMA_VOTE_THRESHOLD", base.compiler.vote_threshold),
            completion_threshold: parse(
                &lookup,
                "TAGMA_COMPLETION_THRESHOLD",
                base.compiler.completion_threshold,
            ),
        };
        let reference_resolution = FrameSize::new(
            parse(&lookup, "TAGMA_REFERENCE_WIDTH", base.reference_resolution.width),
            parse(&lookup, "TAGMA_REFERENCE_HEIGHT", base.reference_resolution.height),
        );

        let detection = DetectionConfig {
            quadrant_overlap: parse(&lookup, "TAGMA_QUADRANT_OVERLAP", base.quadrant_overlap),
            max_concurrent_inference: parse(
                &lookup,
                "TAGMA_MAX_CONCURRENT_INFERENCE",
                base.max_concurrent_inference,
            ),
            output_capacity: parse(&lookup, "TAGMA_ENSEMBLE_CAPACITY", base.output_capacity),
            reference_distance: parse(&lookup, "TAGMA_REFERENCE_DISTANCE", base.reference_distance),
            reference_resolution,
            ..base
        }
        .with_compiler(compiler);

        Self {
            detection,
            prediction_interval: parse(
                &lookup,
                "TAGMA_PREDICTION_INTERVAL",
                defaults.prediction_interval,
            ),
            max_hand_inference: parse(
                &lookup,
                "TAGMA_MAX_HAND_INFERENCE",
                defaults.max_hand_inference,
            ),
            hand_capacity: parse(&lookup, "TAGMA_HAND_CAPACITY", defaults.hand_capacity),
            results_capacity: parse(&lookup, "TAGMA_RESULTS_CAPACITY", defaults.results_capacity),
            command_capacity: parse(&lookup, "TAGMA_COMMAND_CAPACITY", defaults.command_capacity),
            log_format: parse(&lookup, "LOG_FORMAT", defaults.log_format),
        }
    }

    pub fn validate(&self) -> SessionResult<()> {
        self.detection.validate()?;
        if self.prediction_interval == 0 {
            return Err(SessionError::config_error("prediction_interval must be at least 1"));
        }
        if self.max_hand_inference == 0 {
            return Err(SessionError::config_error("max_hand_inference must be at least 1"));
        }
        if self.hand_capacity == 0 || self.results_capacity == 0 || self.command_capacity == 0 {
            return Err(SessionError::config_error("channel capacities must be at least 1"));
        }
        Ok(())
    }
}
