//! Hand-to-part proximity association.
//!
//! A part counts as near a hand when one of the hand's holding joints lies
//! within a distance threshold of the part's center. The threshold was
//! calibrated at a reference resolution and is scaled to each frame by the
//! ratio of frame diagonals.

use tagma_models::{
    Classification, FrameSize, HandDetection, HandDetectionOutcome, HeldResult, Point,
};

use crate::config::DetectionConfig;
use crate::frame_set::FrameDetectionSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityAssociator {
    reference_distance: f64,
    reference_resolution: FrameSize,
}

impl Default for ProximityAssociator {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}

impl ProximityAssociator {
    pub fn new(reference_distance: f64, reference_resolution: FrameSize) -> Self {
        Self {
            reference_distance,
            reference_resolution,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.reference_distance, config.reference_resolution)
    }

    /// Proximity threshold in pixels for a frame of the given size.
    pub fn scaled_threshold(&self, frame: FrameSize) -> f64 {
        self.reference_distance * frame.diagonal() / self.reference_resolution.diagonal()
    }

    /// Work out which parts the hands in a frame are holding.
    pub fn associate(
        &self,
        objects: &FrameDetectionSet,
        hands: &HandDetectionOutcome,
    ) -> HeldResult {
        let mut result = HeldResult::default();
        if objects.is_empty() {
            return result;
        }

        let frame = objects.frame_size();
        let threshold = self.scaled_threshold(frame);
        let centers: Vec<(Classification, Point)> = objects
            .classifications()
            .filter_map(|c| objects.get(c).map(|d| (c, d.denormalized_center(frame))))
            .collect();

        for hand in &hands.hands {
            let hits = proximity_hits(hand, &centers, frame, threshold);
            if let Some(held) = most_common(&hits) {
                result.held.insert(held);
                result.hands_used += 1;
            }
            result.maybe_held.extend(hits);
        }
        result
    }
}

/// Every part near any holding joint of `hand`, in joint order then
/// classification order. A part appears once per joint it is near.
fn proximity_hits(
    hand: &HandDetection,
    centers: &[(Classification, Point)],
    frame: FrameSize,
    threshold: f64,
) -> Vec<Classification> {
    let mut hits = Vec::new();
    for joint in hand.holding_positions() {
        let Some(position) = joint.denormalized_position(frame) else {
            continue;
        };
        for (classification, center) in centers {
            if position.distance_to(center) < threshold {
                hits.push(*classification);
            }
        }
    }
    hits
}

/// Most frequent value; ties go to the value encountered first.
fn most_common(values: &[Classification]) -> Option<Classification> {
    let mut counts = [0usize; Classification::COUNT];
    for value in values {
        counts[value.index()] += 1;
    }
    let max = counts.iter().copied().max().unwrap_or(0);
    values.iter().copied().find(|v| counts[v.index()] == max)
}
