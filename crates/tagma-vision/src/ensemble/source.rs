//! Sub-detector sources and correlation identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use tagma_models::NormalizedRect;
use uuid::Uuid;

/// Region of the frame a sub-detector runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorSource {
    /// The whole frame
    Full,
    /// Top-right corner
    Q1,
    /// Top-left corner
    Q2,
    /// Bottom-left corner
    Q3,
    /// Bottom-right corner
    Q4,
}

impl DetectorSource {
    /// Sub-detectors participating in every ensemble cycle.
    pub const ALL: [DetectorSource; 5] = [
        DetectorSource::Full,
        DetectorSource::Q1,
        DetectorSource::Q2,
        DetectorSource::Q3,
        DetectorSource::Q4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorSource::Full => "full",
            DetectorSource::Q1 => "q1",
            DetectorSource::Q2 => "q2",
            DetectorSource::Q3 => "q3",
            DetectorSource::Q4 => "q4",
        }
    }

    /// Region of the full frame this source sees, for a quadrant covering
    /// `overlap` of the frame's width and height.
    pub fn target_rect(&self, overlap: f64) -> NormalizedRect {
        let p = overlap;
        let q = 1.0 - overlap;
        match self {
            DetectorSource::Full => NormalizedRect::UNIT,
            DetectorSource::Q1 => NormalizedRect::from_corners(q, 0.0, 1.0, p),
            DetectorSource::Q2 => NormalizedRect::from_corners(0.0, 0.0, p, p),
            DetectorSource::Q3 => NormalizedRect::from_corners(0.0, q, p, 1.0),
            DetectorSource::Q4 => NormalizedRect::from_corners(q, q, 1.0, 1.0),
        }
    }

    pub fn is_quadrant(&self) -> bool {
        !matches!(self, DetectorSource::Full)
    }
}

impl fmt::Display for DetectorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity of one sub-detector instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DetectorId(Uuid);

impl DetectorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DetectorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one ensemble cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CycleId(Uuid);

impl CycleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rect(rect: NormalizedRect, min_x: f64, min_y: f64, max_x: f64, max_y: f64) {
        assert!((rect.x - min_x).abs() < 1e-12);
        assert!((rect.y - min_y).abs() < 1e-12);
        assert!((rect.max_x() - max_x).abs() < 1e-12);
        assert!((rect.max_y() - max_y).abs() < 1e-12);
    }

    #[test]
    fn test_quadrant_targets() {
        assert_rect(DetectorSource::Q1.target_rect(0.6), 0.4, 0.0, 1.0, 0.6);
        assert_rect(DetectorSource::Q2.target_rect(0.6), 0.0, 0.0, 0.6, 0.6);
        assert_rect(DetectorSource::Q3.target_rect(0.6), 0.0, 0.4, 0.6, 1.0);
        assert_rect(DetectorSource::Q4.target_rect(0.6), 0.4, 0.4, 1.0, 1.0);
        assert_eq!(DetectorSource::Full.target_rect(0.6), NormalizedRect::UNIT);
    }

    #[test]
    fn test_quadrants_overlap_at_center() {
        let center = tagma_models::Point::new(0.5, 0.5);
        for source in DetectorSource::ALL {
            let rect = source.target_rect(0.6);
            assert!(rect.x <= center.x && center.x <= rect.max_x());
            assert!(rect.y <= center.y && center.y <= rect.max_y());
        }
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(DetectorId::new(), DetectorId::new());
        assert_ne!(CycleId::new(), CycleId::new());
    }
}
