//! Geometric check for a fully assembled structure.
//!
//! The hub must sit in the middle of the four spokes, with the spokes
//! arranged around it in cyclic order and each touching it. Angles are
//! measured in pixel space with the hub as vertex over the path
//! `S[k] -> hub -> S[k-1]` for the spoke cycle `S`.

use std::ops::RangeInclusive;
use tagma_models::{Classification, Point};

use crate::frame_set::FrameDetectionSet;

/// Accepted total of the four signed angles, in degrees.
pub const ANGLE_SUM_RANGE: RangeInclusive<f64> = 350.0..=370.0;

/// Accepted range of each signed angle, in degrees.
pub const ANGLE_RANGE: RangeInclusive<f64> = 50.0..=130.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralCompletionEvaluator;

impl StructuralCompletionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Whether the frame shows the complete structure.
    ///
    /// Always `false` unless the hub and all four spokes are present.
    pub fn evaluate(&self, objects: &FrameDetectionSet) -> bool {
        let Some(angles) = self.measure(objects) else {
            return false;
        };
        if !Self::angles_within_bounds(&angles) {
            return false;
        }

        let Some(hub) = objects.get(Classification::HUB) else {
            return false;
        };
        Classification::SPOKES.iter().all(|spoke| {
            objects
                .get(*spoke)
                .is_some_and(|detection| hub.bbox().intersects(detection.bbox()))
        })
    }

    /// The four signed angles in degrees, in spoke-cycle order.
    ///
    /// `None` when a required part is missing or two centers coincide.
    pub fn measure(&self, objects: &FrameDetectionSet) -> Option<[f64; 4]> {
        let frame = objects.frame_size();
        let hub = objects.get(Classification::HUB)?.denormalized_center(frame);

        let mut spokes = [Point::new(0.0, 0.0); 4];
        for (slot, spoke) in spokes.iter_mut().zip(Classification::SPOKES) {
            *slot = objects.get(spoke)?.denormalized_center(frame);
        }

        let mut angles = [0.0; 4];
        for k in 0..4 {
            let from = spokes[k];
            let to = spokes[(k + 3) % 4];
            angles[k] = signed_angle(from, hub, to)?;
        }
        Some(angles)
    }

    /// Bounds check on measured angles.
    pub fn angles_within_bounds(angles: &[f64; 4]) -> bool {
        let sum: f64 = angles.iter().sum();
        ANGLE_SUM_RANGE.contains(&sum) && angles.iter().all(|a| ANGLE_RANGE.contains(a))
    }
}

/// Angle in degrees between the incoming vector `vertex - from` and the
/// outgoing vector `to - vertex`. Negative when the 2D cross product of
/// incoming and outgoing is non-negative.
fn signed_angle(from: Point, vertex: Point, to: Point) -> Option<f64> {
    let (ix, iy) = (vertex.x - from.x, vertex.y - from.y);
    let (ox, oy) = (to.x - vertex.x, to.y - vertex.y);

    let lengths = ix.hypot(iy) * ox.hypot(oy);
    if lengths == 0.0 {
        return None;
    }

    let cos = ((ix * ox + iy * oy) / lengths).clamp(-1.0, 1.0);
    let degrees = cos.acos().to_degrees();
    let cross = ix * oy - iy * ox;
    Some(if cross >= 0.0 { -degrees } else { degrees })
}
