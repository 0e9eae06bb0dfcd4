//! Offline replay of recorded detections.
//!
//! A recording is JSON lines, one merged frame per line:
//!
//! ```json
//! {"frame_size":{"width":504,"height":896},"detections":[{"bbox":{"x":0.4,"y":0.4,"width":0.2,"height":0.2},"label":"thorax-blue","confidence":0.9}],"hands":{"hands":[]}}
//! ```
//!
//! Frames go through the same temporal compiler a live session uses.

use serde::{Deserialize, Serialize};
use std::io::BufRead;
use tagma_models::{CompiledResult, Detection, FrameSize, HandDetectionOutcome, RawDetection};
use tagma_vision::{DetectionConfig, FrameDetectionSet, TemporalCompiler, VisionError};
use tracing::debug;

use crate::error::{SessionError, SessionResult};

/// One recorded frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub frame_size: FrameSize,
    #[serde(default)]
    pub detections: Vec<RawDetection>,
    #[serde(default)]
    pub hands: HandDetectionOutcome,
}

impl ReplayFrame {
    /// Validate labels and merge into a frame set.
    pub fn into_frame_set(self) -> SessionResult<FrameDetectionSet> {
        let detections = self
            .detections
            .iter()
            .map(|raw| Detection::from_raw(raw).map_err(VisionError::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FrameDetectionSet::from_detections(self.frame_size, detections))
    }
}

/// A result published while replaying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutput {
    /// Zero-based index of the frame that triggered the publish
    pub frame: usize,
    pub result: CompiledResult,
}

/// Feed every frame in `reader` through a fresh compiler.
///
/// Blank lines are skipped. Fails on the first malformed line or unknown
/// label.
pub fn replay<R: BufRead>(
    reader: R,
    config: &DetectionConfig,
) -> SessionResult<Vec<ReplayOutput>> {
    let mut compiler = TemporalCompiler::from_config(config)?;
    let mut outputs = Vec::new();
    let mut index = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let frame: ReplayFrame = serde_json::from_str(&line)
            .map_err(|e| SessionError::replay_failed(format!("line {}: {e}", line_no + 1)))?;
        let hands = frame.hands.clone();
        let set = frame.into_frame_set()?;

        if compiler.add_outcome(set, &hands) {
            let result = compiler.retrieve_results();
            debug!(frame = index, detected = result.detected.len(), "Replay published result");
            outputs.push(ReplayOutput { frame: index, result });
        }
        index += 1;
    }

    Ok(outputs)
}
