//! Join barrier for ensemble cycles.
//!
//! The aggregator is the only writer of the in-progress [`FrameDetectionSet`].
//! It runs as a single task fed by an mpsc channel, so concurrent
//! sub-detector completions are serialized without locks.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tagma_models::{Detection, FrameSize, NormalizedRect};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::source::{CycleId, DetectorId, DetectorSource};
use super::sub_detector::{Completion, EnsembleMessage};
use crate::error::{VisionError, VisionResult};
use crate::frame_set::FrameDetectionSet;
use crate::metrics;

struct ActiveCycle {
    id: CycleId,
    set: FrameDetectionSet,
    reported: HashSet<DetectorId>,
    started: Instant,
}

/// Collects sub-detector completions for one cycle at a time.
pub struct CycleAggregator {
    detectors: HashMap<DetectorId, (DetectorSource, NormalizedRect)>,
    cycle: Option<ActiveCycle>,
}

impl CycleAggregator {
    pub fn new(
        detectors: impl IntoIterator<Item = (DetectorId, DetectorSource, NormalizedRect)>,
    ) -> Self {
        Self {
            detectors: detectors
                .into_iter()
                .map(|(id, source, target)| (id, (source, target)))
                .collect(),
            cycle: None,
        }
    }

    /// Number of completions that finish a cycle.
    pub fn expected(&self) -> usize {
        self.detectors.len()
    }

    pub fn current_cycle(&self) -> Option<CycleId> {
        self.cycle.as_ref().map(|c| c.id)
    }

    /// Completions recorded so far in the current cycle.
    pub fn completed(&self) -> usize {
        self.cycle.as_ref().map_or(0, |c| c.reported.len())
    }

    /// Start collecting a new cycle, discarding any unfinished one.
    pub fn begin_cycle(&mut self, id: CycleId, frame_size: FrameSize) {
        if let Some(stale) = self.cycle.take() {
            warn!(
                cycle = %stale.id,
                completed = stale.reported.len(),
                "Discarding unfinished ensemble cycle"
            );
        }
        self.cycle = Some(ActiveCycle {
            id,
            set: FrameDetectionSet::new(frame_size),
            reported: HashSet::new(),
            started: Instant::now(),
        });
    }

    /// Record one sub-detector completion.
    ///
    /// Every completion counts toward the barrier, including failed ones,
    /// which contribute no detections. Returns `true` when this completion
    /// was the last one the cycle was waiting for.
    ///
    /// Fails with a fatal error when the completion cannot be correlated
    /// with a known detector in the current cycle, or when the model emits
    /// a label outside the classification set.
    pub fn record_completion(&mut self, completion: Completion) -> VisionResult<bool> {
        let unknown = || VisionError::UnknownDetectorSource {
            detector: completion.detector,
            cycle: completion.cycle,
        };

        let (source, target) = *self.detectors.get(&completion.detector).ok_or_else(unknown)?;
        let cycle = match self.cycle.as_mut() {
            Some(cycle) if cycle.id == completion.cycle => cycle,
            _ => return Err(unknown()),
        };
        if !cycle.reported.insert(completion.detector) {
            return Err(unknown());
        }

        match completion.result {
            Ok(raw) => {
                debug!(
                    cycle = %cycle.id,
                    source = %source,
                    detections = raw.len(),
                    "Sub-detection completed"
                );
                for raw in &raw {
                    let mut detection = Detection::from_raw(raw)?;
                    if !raw.bbox.is_within_unit() {
                        warn!(
                            cycle = %cycle.id,
                            source = %source,
                            label = %raw.label,
                            "Discarding detection outside the image"
                        );
                        continue;
                    }
                    if source.is_quadrant() {
                        detection.rescale_into(&target);
                    }
                    cycle.set.add_detection(detection);
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(
                    cycle = %cycle.id,
                    source = %source,
                    error = %e,
                    "Sub-detection failed, contributing no detections"
                );
                metrics::record_sub_detection_failure(source.as_str(), e.kind());
            }
        }

        let reported = cycle.reported.len();
        Ok(reported == self.expected())
    }

    /// Merge and hand out the current cycle's detections, resetting the
    /// barrier.
    pub fn finish_cycle(&mut self) -> Option<FrameDetectionSet> {
        let cycle = self.cycle.take()?;
        let mut set = cycle.set;
        set.merge();

        let elapsed = cycle.started.elapsed().as_secs_f64();
        metrics::record_cycle_completed(elapsed);
        info!(
            cycle = %cycle.id,
            classifications = set.len(),
            duration_ms = (elapsed * 1000.0) as u64,
            "Ensemble cycle complete"
        );
        Some(set)
    }

    /// Drive the aggregator until every sender is gone.
    ///
    /// `in_flight` is cleared after each merged set has been delivered.
    /// Stops on the first fatal error.
    pub async fn run(
        mut self,
        mut messages: mpsc::UnboundedReceiver<EnsembleMessage>,
        output: mpsc::Sender<FrameDetectionSet>,
        in_flight: Arc<AtomicBool>,
    ) -> VisionResult<()> {
        while let Some(message) = messages.recv().await {
            match message {
                EnsembleMessage::CycleStarted { cycle, frame_size } => {
                    self.begin_cycle(cycle, frame_size);
                }
                EnsembleMessage::Completion(completion) => {
                    let finished = match self.record_completion(completion) {
                        Ok(finished) => finished,
                        Err(e) => {
                            error!(
                                error = %e,
                                completed = self.completed(),
                                expected = self.expected(),
                                "Ensemble aggregation stopped"
                            );
                            return Err(e);
                        }
                    };
                    if !finished {
                        continue;
                    }
                    if let Some(set) = self.finish_cycle() {
                        if output.send(set).await.is_err() {
                            info!("Ensemble output receiver dropped, stopping aggregation");
                            return Err(VisionError::channel_closed("ensemble output"));
                        }
                    }
                    in_flight.store(false, Ordering::Release);
                }
            }
        }
        debug!("Ensemble aggregation finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagma_models::{Classification, RawDetection};

    const FRAME: FrameSize = FrameSize {
        width: 100,
        height: 100,
    };

    fn aggregator() -> (CycleAggregator, Vec<(DetectorId, DetectorSource)>) {
        let ids: Vec<_> = DetectorSource::ALL
            .iter()
            .map(|source| (DetectorId::new(), *source))
            .collect();
        let aggregator = CycleAggregator::new(
            ids.iter()
                .map(|(id, source)| (*id, *source, source.target_rect(0.6))),
        );
        (aggregator, ids)
    }

    #[test]
    fn test_barrier_counts_failures() {
        let (mut aggregator, ids) = aggregator();
        let cycle = CycleId::new();
        aggregator.begin_cycle(cycle, FRAME);

        for (i, (id, _)) in ids.iter().enumerate() {
            let result = if i == 2 {
                Err(VisionError::crop_failure("q2", "empty"))
            } else {
                Ok(Vec::new())
            };
            let finished = aggregator
                .record_completion(Completion::new(*id, cycle, result))
                .unwrap();
            assert_eq!(finished, i == ids.len() - 1);
            assert_eq!(aggregator.completed(), i + 1);
        }

        let set = aggregator.finish_cycle().unwrap();
        assert!(set.is_empty());
        assert!(aggregator.current_cycle().is_none());
    }

    #[test]
    fn test_quadrant_detections_are_reprojected() {
        let (mut aggregator, ids) = aggregator();
        let cycle = CycleId::new();
        aggregator.begin_cycle(cycle, FRAME);

        let (q4, _) = ids
            .iter()
            .find(|(_, source)| *source == DetectorSource::Q4)
            .unwrap();
        let raw = RawDetection::new(NormalizedRect::UNIT, "abdomen-magenta", 0.8);
        aggregator
            .record_completion(Completion::new(*q4, cycle, Ok(vec![raw])))
            .unwrap();

        for (id, _) in ids.iter().filter(|(id, _)| id != q4) {
            aggregator
                .record_completion(Completion::empty(*id, cycle))
                .unwrap();
        }

        let set = aggregator.finish_cycle().unwrap();
        let abdomen = set.get(Classification::Abdomen).unwrap();
        let target = DetectorSource::Q4.target_rect(0.6);
        assert!((abdomen.bbox().x - target.x).abs() < 1e-12);
        assert!((abdomen.bbox().y - target.y).abs() < 1e-12);
        assert!((abdomen.bbox().max_x() - 1.0).abs() < 1e-12);
        assert!((abdomen.bbox().max_y() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_detector_is_fatal() {
        let (mut aggregator, _) = aggregator();
        let cycle = CycleId::new();
        aggregator.begin_cycle(cycle, FRAME);

        let err = aggregator
            .record_completion(Completion::empty(DetectorId::new(), cycle))
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_stale_cycle_is_fatal() {
        let (mut aggregator, ids) = aggregator();
        aggregator.begin_cycle(CycleId::new(), FRAME);

        let err = aggregator
            .record_completion(Completion::empty(ids[0].0, CycleId::new()))
            .unwrap_err();
        assert!(matches!(err, VisionError::UnknownDetectorSource { .. }));
    }

    #[test]
    fn test_duplicate_completion_is_fatal() {
        let (mut aggregator, ids) = aggregator();
        let cycle = CycleId::new();
        aggregator.begin_cycle(cycle, FRAME);

        aggregator
            .record_completion(Completion::empty(ids[0].0, cycle))
            .unwrap();
        assert!(aggregator
            .record_completion(Completion::empty(ids[0].0, cycle))
            .is_err());
    }

    #[test]
    fn test_unknown_label_is_fatal() {
        let (mut aggregator, ids) = aggregator();
        let cycle = CycleId::new();
        aggregator.begin_cycle(cycle, FRAME);

        let raw = RawDetection::new(NormalizedRect::UNIT, "antenna-black", 0.9);
        let err = aggregator
            .record_completion(Completion::new(ids[0].0, cycle, Ok(vec![raw])))
            .unwrap_err();
        assert!(matches!(err, VisionError::MalformedClassification(_)));
    }

    #[test]
    fn test_out_of_range_boxes_are_discarded() {
        let (mut aggregator, ids) = aggregator();
        let cycle = CycleId::new();
        aggregator.begin_cycle(cycle, FRAME);

        let detections = vec![
            RawDetection::new(NormalizedRect::new(0.7, 0.2, 0.6, 0.2), "head-yellow", 0.9),
            RawDetection::new(NormalizedRect::new(0.2, 0.2, 0.2, 0.2), "thorax-blue", 0.9),
        ];
        aggregator
            .record_completion(Completion::new(ids[0].0, cycle, Ok(detections)))
            .unwrap();
        for (id, _) in &ids[1..] {
            aggregator
                .record_completion(Completion::empty(*id, cycle))
                .unwrap();
        }

        let set = aggregator.finish_cycle().unwrap();
        assert!(!set.contains(Classification::Head));
        assert!(set.contains(Classification::Thorax));
    }
}
