//! Normalized geometry shared by detections and hand joints.
//!
//! All coordinates are normalized to the frame (0.0 to 1.0) with the origin
//! at the top-left corner and y growing downward. Pixel-space values are
//! obtained by denormalizing against a [`FrameSize`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Pixel dimensions of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Length of the frame diagonal in pixels.
    pub fn diagonal(&self) -> f64 {
        (self.width as f64).hypot(self.height as f64)
    }
}

/// A point, either normalized or in pixel space depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Scale a normalized point into pixel space.
    pub fn denormalize(&self, frame: FrameSize) -> Point {
        Point {
            x: self.x * frame.width as f64,
            y: self.y * frame.height as f64,
        }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A normalized rectangle (0.0 to 1.0) representing a relative region of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedRect {
    /// X coordinate of the top-left corner (0.0 = left, 1.0 = right)
    pub x: f64,
    /// Y coordinate of the top-left corner (0.0 = top, 1.0 = bottom)
    pub y: f64,
    /// Width of the rectangle (0.0 to 1.0)
    pub width: f64,
    /// Height of the rectangle (0.0 to 1.0)
    pub height: f64,
}

impl NormalizedRect {
    /// The whole frame.
    pub const UNIT: NormalizedRect = NormalizedRect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    /// Slack allowed past the right and bottom edges.
    pub const EDGE_TOLERANCE: f64 = 1e-3;

    /// Create a new normalized rectangle.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Create from corner coordinates.
    pub fn from_corners(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }

    /// Right edge x-coordinate.
    #[inline]
    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate.
    #[inline]
    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    #[inline]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether the rect has positive extent and lies inside the unit square.
    ///
    /// The far edges may overshoot by `EDGE_TOLERANCE`.
    pub fn is_within_unit(&self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.x >= 0.0
            && self.y >= 0.0
            && self.max_x() <= 1.0 + Self::EDGE_TOLERANCE
            && self.max_y() <= 1.0 + Self::EDGE_TOLERANCE
    }

    /// Smallest rectangle containing both rectangles.
    pub fn union(&self, other: &NormalizedRect) -> NormalizedRect {
        NormalizedRect::from_corners(
            self.x.min(other.x),
            self.y.min(other.y),
            self.max_x().max(other.max_x()),
            self.max_y().max(other.max_y()),
        )
    }

    /// Smallest rectangle containing every input rectangle.
    pub fn union_all<'a, I>(rects: I) -> Option<NormalizedRect>
    where
        I: IntoIterator<Item = &'a NormalizedRect>,
    {
        rects
            .into_iter()
            .fold(None, |acc: Option<NormalizedRect>, rect| match acc {
                Some(merged) => Some(merged.union(rect)),
                None => Some(*rect),
            })
    }

    /// Whether the two rectangles overlap. Shared edges count as touching.
    pub fn intersects(&self, other: &NormalizedRect) -> bool {
        self.x <= other.max_x()
            && other.x <= self.max_x()
            && self.y <= other.max_y()
            && other.y <= self.max_y()
    }

    /// Linearly remap a rectangle expressed in `target`-local unit
    /// coordinates into the coordinate space `target` lives in.
    ///
    /// `UNIT.remap_into(&t) == t` for any `t`.
    pub fn remap_into(&self, target: &NormalizedRect) -> NormalizedRect {
        NormalizedRect {
            x: target.x + self.x * target.width,
            y: target.y + self.y * target.height,
            width: self.width * target.width,
            height: self.height * target.height,
        }
    }

    /// Pixel-space rectangle as `(x, y, width, height)`.
    pub fn denormalize(&self, frame: FrameSize) -> (f64, f64, f64, f64) {
        let w = frame.width as f64;
        let h = frame.height as f64;
        (self.x * w, self.y * h, self.width * w, self.height * h)
    }
}
