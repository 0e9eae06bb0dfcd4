//! Per-frame and per-window detection results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::classification::Classification;

/// Ordered set of classifications. Iteration follows declaration order.
pub type ClassificationSet = BTreeSet<Classification>;

/// What the hands in a single frame are holding.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct HeldResult {
    /// Most likely held part of each hand
    pub held: ClassificationSet,
    /// Every part near any holding joint
    pub maybe_held: ClassificationSet,
    /// Hands holding something this frame
    pub hands_used: usize,
}

impl HeldResult {
    pub fn is_empty(&self) -> bool {
        self.held.is_empty() && self.maybe_held.is_empty()
    }
}

/// Result published by the temporal compiler once per window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct CompiledResult {
    /// Parts that reached the vote threshold in the window
    pub detected: ClassificationSet,
    /// Held parts, restricted to `detected`
    pub held: ClassificationSet,
    /// Possibly held parts, restricted to `detected`
    pub maybe_held: ClassificationSet,
    /// Agreed number of hands in use, never more than `held.len()`
    pub hands_used: usize,
    /// Whether enough frames showed the assembled structure
    pub is_complete: bool,
    /// Fraction of buffered frames that showed the assembled structure
    pub completion_confidence: f64,
}

impl CompiledResult {
    pub fn has_no_detections(&self) -> bool {
        self.detected.is_empty()
    }

    pub fn has_no_held_detections(&self) -> bool {
        self.held.is_empty()
    }

    pub fn has_no_maybe_held_detections(&self) -> bool {
        self.maybe_held.is_empty()
    }

    /// Whether a part picked up earlier is still in hand.
    ///
    /// Checks `maybe_held` so a single fingertip slipping off the piece does
    /// not count as putting it down.
    pub fn still_held(&self, original: Classification) -> bool {
        self.maybe_held.contains(&original)
    }

    pub fn is_detected(&self, classification: Classification) -> bool {
        self.detected.contains(&classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_result_is_empty() {
        let result = CompiledResult::default();
        assert!(result.has_no_detections());
        assert!(result.has_no_held_detections());
        assert!(result.has_no_maybe_held_detections());
        assert_eq!(result.hands_used, 0);
        assert!(!result.is_complete);
    }

    #[test]
    fn test_still_held_uses_maybe_held() {
        let result = CompiledResult {
            detected: [Classification::Head, Classification::Thorax].into_iter().collect(),
            held: [Classification::Thorax].into_iter().collect(),
            maybe_held: [Classification::Head, Classification::Thorax].into_iter().collect(),
            hands_used: 1,
            ..Default::default()
        };
        assert!(result.still_held(Classification::Head));
        assert!(!result.still_held(Classification::Abdomen));
    }

    #[test]
    fn test_sets_serialize_in_declaration_order() {
        let result = CompiledResult {
            detected: [Classification::RightWing, Classification::Head].into_iter().collect(),
            ..Default::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["detected"], serde_json::json!(["head", "right_wing"]));
    }
}
