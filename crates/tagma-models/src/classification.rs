//! Part classifications recognized by the detection model.
//!
//! The set is closed: every raw label emitted by the model must map to
//! exactly one `Classification`. The wings are treated as tagmata for the
//! purposes of assembly.
//!
//! | Classification | Raw label | Role |
//! |----------------|-----------|------|
//! | `Head` | `head-yellow` | spoke |
//! | `Thorax` | `thorax-blue` | hub |
//! | `Abdomen` | `abdomen-magenta` | spoke |
//! | `LeftWing` | `wing-red` | spoke |
//! | `RightWing` | `wing-green` | spoke |

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A recognizable part of the assembled model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Head,
    Thorax,
    Abdomen,
    LeftWing,
    RightWing,
}

impl Classification {
    /// Number of classifications in the closed set.
    pub const COUNT: usize = 5;

    /// All classifications, in declaration order.
    pub const ALL: [Classification; Classification::COUNT] = [
        Classification::Head,
        Classification::Thorax,
        Classification::Abdomen,
        Classification::LeftWing,
        Classification::RightWing,
    ];

    /// The part every other core part attaches to.
    pub const HUB: Classification = Classification::Thorax;

    /// Spokes in cyclic adjacency order around the hub.
    pub const SPOKES: [Classification; 4] = [
        Classification::Head,
        Classification::LeftWing,
        Classification::Abdomen,
        Classification::RightWing,
    ];

    /// Stable slot index, usable for fixed-size arenas.
    #[inline]
    pub fn index(&self) -> usize {
        match self {
            Classification::Head => 0,
            Classification::Thorax => 1,
            Classification::Abdomen => 2,
            Classification::LeftWing => 3,
            Classification::RightWing => 4,
        }
    }

    /// Label emitted by the detection model.
    pub fn raw_label(&self) -> &'static str {
        match self {
            Classification::Head => "head-yellow",
            Classification::Thorax => "thorax-blue",
            Classification::Abdomen => "abdomen-magenta",
            Classification::LeftWing => "wing-red",
            Classification::RightWing => "wing-green",
        }
    }

    /// Returns the classification name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Head => "head",
            Classification::Thorax => "thorax",
            Classification::Abdomen => "abdomen",
            Classification::LeftWing => "left_wing",
            Classification::RightWing => "right_wing",
        }
    }

    /// Colour of the physical piece carrying this part.
    pub fn color_description(&self) -> &'static str {
        match self {
            Classification::Head => "Yellow",
            Classification::Thorax => "Blue",
            Classification::Abdomen => "Magenta",
            Classification::LeftWing => "Red",
            Classification::RightWing => "Green",
        }
    }

    /// Parse a raw model label.
    ///
    /// Fails for any label outside the closed set.
    pub fn from_raw_label(label: &str) -> Result<Self, ClassificationParseError> {
        Classification::ALL
            .into_iter()
            .find(|c| c.raw_label() == label)
            .ok_or_else(|| ClassificationParseError(label.to_string()))
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Classification {
    type Err = ClassificationParseError;

    /// Accepts either the snake_case name or the raw model label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "head" => Ok(Classification::Head),
            "thorax" => Ok(Classification::Thorax),
            "abdomen" => Ok(Classification::Abdomen),
            "left_wing" => Ok(Classification::LeftWing),
            "right_wing" => Ok(Classification::RightWing),
            other => Classification::from_raw_label(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown classification label: {0}")]
pub struct ClassificationParseError(pub String);
