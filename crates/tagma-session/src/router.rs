//! Routes captured frames to the detectors.

use image::DynamicImage;
use std::sync::Arc;
use tagma_vision::{HandDetector, SpatialEnsembleDetector, VisionResult};
use tracing::debug;

/// What happened to one captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureDecision {
    /// Hand pose inference accepted the frame
    pub hands: bool,
    /// `Some` when the frame was offered to the ensemble, with whether it
    /// was accepted
    pub ensemble: Option<bool>,
}

/// Sends every frame to hand detection and every nth frame to the
/// ensemble.
pub struct CaptureRouter {
    ensemble: SpatialEnsembleDetector,
    hands: HandDetector,
    prediction_interval: u64,
    frame_id: u64,
    running: bool,
}

impl CaptureRouter {
    pub fn new(
        ensemble: SpatialEnsembleDetector,
        hands: HandDetector,
        prediction_interval: u64,
    ) -> Self {
        Self {
            ensemble,
            hands,
            prediction_interval: prediction_interval.max(1),
            frame_id: 0,
            running: true,
        }
    }

    /// Handle one captured frame. Never blocks.
    pub fn on_capture(&mut self, frame: DynamicImage) -> CaptureDecision {
        let frame_id = self.frame_id;
        self.frame_id += 1;

        if !self.running {
            return CaptureDecision::default();
        }

        let frame = Arc::new(frame);
        let hands = self.hands.predict(Arc::clone(&frame));
        let ensemble =
            (frame_id % self.prediction_interval == 0).then(|| self.ensemble.predict(frame));

        if ensemble == Some(false) {
            debug!(frame_id, "Ensemble busy, frame skipped");
        }
        CaptureDecision { hands, ensemble }
    }

    /// Stop running models on captured frames.
    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn resume(&mut self) {
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_prediction_interval(&mut self, interval: u64) {
        self.prediction_interval = interval.max(1);
    }

    /// Frames captured so far, including paused ones.
    pub fn frames_captured(&self) -> u64 {
        self.frame_id
    }

    /// Stop the ensemble and surface any fatal error it hit.
    pub async fn shutdown(self) -> VisionResult<()> {
        drop(self.hands);
        self.ensemble.shutdown().await
    }
}
