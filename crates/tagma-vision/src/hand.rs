//! Bounded dispatch of hand pose inference.

use async_trait::async_trait;
use image::DynamicImage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tagma_models::HandDetectionOutcome;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{VisionError, VisionResult};
use crate::metrics;

/// Hand pose model execution.
#[async_trait]
pub trait HandPoseProvider: Send + Sync {
    /// Detect every hand in the image, with joints normalized to it.
    async fn detect_hands(&self, image: &DynamicImage) -> VisionResult<HandDetectionOutcome>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Hand outcome tagged with the order its frame was submitted in.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencedHands {
    pub sequence: u64,
    pub outcome: HandDetectionOutcome,
}

/// Runs hand pose inference on frames, dropping frames while the
/// concurrency bound is reached.
pub struct HandDetector {
    provider: Arc<dyn HandPoseProvider>,
    permits: Arc<Semaphore>,
    next_sequence: AtomicU64,
    output: mpsc::Sender<SequencedHands>,
}

impl HandDetector {
    /// Returns the detector and the receiver of completed outcomes.
    pub fn new(
        provider: Arc<dyn HandPoseProvider>,
        max_concurrent: usize,
        capacity: usize,
    ) -> VisionResult<(Self, mpsc::Receiver<SequencedHands>)> {
        if max_concurrent == 0 {
            return Err(VisionError::invalid_config(
                "max_concurrent_inference must be at least 1",
            ));
        }
        if capacity == 0 {
            return Err(VisionError::invalid_config("hand channel capacity must be at least 1"));
        }

        let (output, rx) = mpsc::channel(capacity);
        Ok((
            Self {
                provider,
                permits: Arc::new(Semaphore::new(max_concurrent)),
                next_sequence: AtomicU64::new(0),
                output,
            },
            rx,
        ))
    }

    /// Start hand pose inference for `frame`. Returns whether it was accepted.
    pub fn predict(&self, frame: Arc<DynamicImage>) -> bool {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                metrics::record_frame_dropped("hands");
                return false;
            }
        };

        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let provider = Arc::clone(&self.provider);
        let output = self.output.clone();

        tokio::spawn(async move {
            let outcome = match provider.detect_hands(&frame).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        error = %e,
                        "Hand pose inference failed, treating as no hands"
                    );
                    HandDetectionOutcome::empty()
                }
            };
            drop(permit);

            match output.try_send(SequencedHands { sequence, outcome }) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(sequence, "Hand outcome channel full, dropping outcome");
                }
                Err(TrySendError::Closed(_)) => {}
            }
        });

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagma_models::{Chirality, HandDetection};
    use tokio::sync::Notify;

    struct GatedHands {
        gate: Arc<Notify>,
        fail: bool,
    }

    #[async_trait]
    impl HandPoseProvider for GatedHands {
        async fn detect_hands(&self, _image: &DynamicImage) -> VisionResult<HandDetectionOutcome> {
            self.gate.notified().await;
            if self.fail {
                return Err(VisionError::inference_failed("pose model crashed"));
            }
            Ok(HandDetectionOutcome::new(vec![HandDetection::new(Chirality::Left)]))
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    #[tokio::test]
    async fn test_predict_drops_when_saturated() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(GatedHands {
            gate: gate.clone(),
            fail: false,
        });
        let (detector, mut rx) = HandDetector::new(provider, 1, 4).unwrap();
        let frame = Arc::new(DynamicImage::new_rgb8(4, 4));

        assert!(detector.predict(frame.clone()));
        assert!(!detector.predict(frame));

        gate.notify_one();
        let hands = rx.recv().await.unwrap();
        assert_eq!(hands.sequence, 0);
        assert_eq!(hands.outcome.hands.len(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_yields_empty_outcome() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(GatedHands {
            gate: gate.clone(),
            fail: true,
        });
        let (detector, mut rx) = HandDetector::new(provider, 2, 4).unwrap();

        gate.notify_one();
        assert!(detector.predict(Arc::new(DynamicImage::new_rgb8(4, 4))));
        let hands = rx.recv().await.unwrap();
        assert!(hands.outcome.is_empty());
    }

    #[test]
    fn test_zero_bound_rejected() {
        let provider = Arc::new(GatedHands {
            gate: Arc::new(Notify::new()),
            fail: false,
        });
        assert!(HandDetector::new(provider, 0, 4).is_err());
    }
}
