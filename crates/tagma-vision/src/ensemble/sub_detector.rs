//! A single region detector with a bounded number of in-flight inferences.

use image::DynamicImage;
use std::sync::Arc;
use tagma_models::{NormalizedRect, RawDetection};
use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

use super::provider::{crop_region, ObjectDetectionProvider};
use super::source::{CycleId, DetectorId, DetectorSource};
use crate::error::VisionResult;

/// Result of one sub-detection, tagged for correlation.
#[derive(Debug)]
pub struct Completion {
    pub detector: DetectorId,
    pub cycle: CycleId,
    pub result: VisionResult<Vec<RawDetection>>,
}

impl Completion {
    pub fn new(
        detector: DetectorId,
        cycle: CycleId,
        result: VisionResult<Vec<RawDetection>>,
    ) -> Self {
        Self {
            detector,
            cycle,
            result,
        }
    }

    /// An empty contribution for a request that was never run.
    pub fn empty(detector: DetectorId, cycle: CycleId) -> Self {
        Self::new(detector, cycle, Ok(Vec::new()))
    }
}

/// Messages consumed by the aggregation actor.
#[derive(Debug)]
pub enum EnsembleMessage {
    CycleStarted {
        cycle: CycleId,
        frame_size: tagma_models::FrameSize,
    },
    Completion(Completion),
}

/// Runs one region of every frame through its own provider.
pub struct BoundedDetector {
    id: DetectorId,
    source: DetectorSource,
    target: NormalizedRect,
    provider: Arc<dyn ObjectDetectionProvider>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl BoundedDetector {
    pub fn new(
        source: DetectorSource,
        overlap: f64,
        provider: Arc<dyn ObjectDetectionProvider>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            id: DetectorId::new(),
            source,
            target: source.target_rect(overlap),
            provider,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn id(&self) -> DetectorId {
        self.id
    }

    pub fn source(&self) -> DetectorSource {
        self.source
    }

    /// Region of the full frame this detector sees.
    pub fn target(&self) -> NormalizedRect {
        self.target
    }

    /// Inferences currently running.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent.saturating_sub(self.permits.available_permits())
    }

    /// Start inference for `frame` in the background.
    ///
    /// Returns `false` without doing anything when the concurrency bound is
    /// reached. The completion is sent on `completions` whether inference
    /// succeeds or fails.
    pub fn dispatch(
        &self,
        cycle: CycleId,
        frame: Arc<DynamicImage>,
        completions: mpsc::UnboundedSender<EnsembleMessage>,
    ) -> bool {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                debug!(source = %self.source, "Sub-detector busy, dropping request");
                return false;
            }
        };

        let id = self.id;
        let source = self.source;
        let target = self.target;
        let provider = Arc::clone(&self.provider);

        tokio::spawn(async move {
            let result = match source {
                DetectorSource::Full => provider.detect(&frame).await,
                _ => match crop_region(&frame, &target) {
                    Ok(region) => provider.detect(&region).await,
                    Err(e) => Err(e),
                },
            };
            drop(permit);

            // The aggregator only goes away on shutdown or after a fatal error.
            let completion = Completion::new(id, cycle, result);
            let _ = completions.send(EnsembleMessage::Completion(completion));
        });

        true
    }
}
