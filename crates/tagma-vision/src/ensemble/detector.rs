//! Spatial ensemble detector.
//!
//! Each accepted frame is run through five sub-detectors: the full frame and
//! four overlapping corner quadrants. Quadrant detections are reprojected
//! into full-frame coordinates and everything is merged into one
//! [`FrameDetectionSet`] per cycle. Only one cycle runs at a time; frames
//! arriving meanwhile are dropped.

use image::{DynamicImage, GenericImageView};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tagma_models::FrameSize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::aggregator::CycleAggregator;
use super::provider::ObjectDetectionProvider;
use super::source::{CycleId, DetectorSource};
use super::sub_detector::{BoundedDetector, Completion, EnsembleMessage};
use crate::config::DetectionConfig;
use crate::error::{VisionError, VisionResult};
use crate::frame_set::FrameDetectionSet;
use crate::metrics;

pub struct SpatialEnsembleDetector {
    config: DetectionConfig,
    detectors: Vec<BoundedDetector>,
    messages: mpsc::UnboundedSender<EnsembleMessage>,
    in_flight: Arc<AtomicBool>,
    aggregator: JoinHandle<VisionResult<()>>,
}

impl SpatialEnsembleDetector {
    /// Create the detector and spawn its aggregation task.
    ///
    /// `provider_for` is called once per [`DetectorSource`]. Returns the
    /// detector and the receiver of merged per-cycle sets.
    pub fn new<F>(
        config: DetectionConfig,
        mut provider_for: F,
    ) -> VisionResult<(Self, mpsc::Receiver<FrameDetectionSet>)>
    where
        F: FnMut(DetectorSource) -> Arc<dyn ObjectDetectionProvider>,
    {
        config.validate()?;

        let detectors: Vec<BoundedDetector> = DetectorSource::ALL
            .into_iter()
            .map(|source| {
                BoundedDetector::new(
                    source,
                    config.quadrant_overlap,
                    provider_for(source),
                    config.max_concurrent_inference,
                )
            })
            .collect();

        let aggregator = CycleAggregator::new(
            detectors
                .iter()
                .map(|d| (d.id(), d.source(), d.target())),
        );

        let (messages, rx) = mpsc::unbounded_channel();
        let (output, merged) = mpsc::channel(config.output_capacity);
        let in_flight = Arc::new(AtomicBool::new(false));

        let aggregator = tokio::spawn(aggregator.run(rx, output, Arc::clone(&in_flight)));

        info!(
            quadrant_overlap = config.quadrant_overlap,
            max_concurrent_inference = config.max_concurrent_inference,
            "Spatial ensemble detector started"
        );

        Ok((
            Self {
                config,
                detectors,
                messages,
                in_flight,
                aggregator,
            },
            merged,
        ))
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Start a cycle for `frame` unless one is already running.
    ///
    /// Never blocks. Returns whether the frame was accepted.
    pub fn predict(&self, frame: Arc<DynamicImage>) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Ensemble cycle in flight, dropping frame");
            metrics::record_frame_dropped("ensemble");
            return false;
        }

        let (width, height) = frame.dimensions();
        let cycle = CycleId::new();
        let started = EnsembleMessage::CycleStarted {
            cycle,
            frame_size: FrameSize::new(width, height),
        };
        if self.messages.send(started).is_err() {
            warn!("Ensemble aggregator is gone, dropping frame");
            self.in_flight.store(false, Ordering::Release);
            return false;
        }
        metrics::record_cycle_started();
        debug!(cycle = %cycle, width, height, "Ensemble cycle started");

        for detector in &self.detectors {
            if !detector.dispatch(cycle, Arc::clone(&frame), self.messages.clone()) {
                metrics::record_frame_dropped(detector.source().as_str());
                let _ = self
                    .messages
                    .send(EnsembleMessage::Completion(Completion::empty(detector.id(), cycle)));
            }
        }
        true
    }

    pub fn is_cycle_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Stop accepting frames and wait for the aggregation task.
    ///
    /// Returns the fatal error that stopped aggregation, if any.
    pub async fn shutdown(self) -> VisionResult<()> {
        drop(self.messages);
        drop(self.detectors);
        let result = self
            .aggregator
            .await
            .map_err(|e| VisionError::channel_closed(format!("aggregation task failed: {e}")))?;
        info!("Spatial ensemble detector stopped");
        result
    }
}
