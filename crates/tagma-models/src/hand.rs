//! Hand pose detections produced by the hand-pose collaborator.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::rect::{FrameSize, Point};

/// Which hand a pose belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Chirality {
    Left,
    Right,
    #[default]
    Unknown,
}

/// Named hand landmark in the standard 21-point hand skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JointName {
    Wrist,
    ThumbCmc,
    ThumbMp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    LittleMcp,
    LittlePip,
    LittleDip,
    LittleTip,
}

impl JointName {
    pub const ALL: [JointName; 21] = [
        JointName::Wrist,
        JointName::ThumbCmc,
        JointName::ThumbMp,
        JointName::ThumbIp,
        JointName::ThumbTip,
        JointName::IndexMcp,
        JointName::IndexPip,
        JointName::IndexDip,
        JointName::IndexTip,
        JointName::MiddleMcp,
        JointName::MiddlePip,
        JointName::MiddleDip,
        JointName::MiddleTip,
        JointName::RingMcp,
        JointName::RingPip,
        JointName::RingDip,
        JointName::RingTip,
        JointName::LittleMcp,
        JointName::LittlePip,
        JointName::LittleDip,
        JointName::LittleTip,
    ];

    /// Whether this joint is used to decide what a hand is holding.
    pub fn is_holding_joint(&self) -> bool {
        HOLDING_JOINTS.contains(self)
    }
}

/// Fingertips that touch a piece when it is pinched or gripped.
pub const HOLDING_JOINTS: [JointName; 3] = [
    JointName::ThumbTip,
    JointName::IndexTip,
    JointName::MiddleTip,
];

/// A single hand landmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JointPosition {
    pub name: JointName,
    /// Normalized position, `None` when the landmark was not located
    pub position: Option<Point>,
    /// Landmark confidence [0, 1]
    pub confidence: f64,
}

impl JointPosition {
    pub fn new(name: JointName, position: Point, confidence: f64) -> Self {
        Self {
            name,
            position: Some(position),
            confidence,
        }
    }

    /// A landmark the pose model could not locate.
    pub fn missing(name: JointName) -> Self {
        Self {
            name,
            position: None,
            confidence: 0.0,
        }
    }

    /// Position in pixel space, if the landmark was located.
    pub fn denormalized_position(&self, frame: FrameSize) -> Option<Point> {
        self.position.map(|p| p.denormalize(frame))
    }
}

/// Gesture labels produced by the hand gesture classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HandGestureLabel {
    Stop,
    Background,
}

impl HandGestureLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandGestureLabel::Stop => "stop",
            HandGestureLabel::Background => "background",
        }
    }
}

/// A gesture label outside the classifier's label set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown gesture label: {0}")]
pub struct GestureParseError(pub String);

impl FromStr for HandGestureLabel {
    type Err = GestureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop" => Ok(HandGestureLabel::Stop),
            "background" => Ok(HandGestureLabel::Background),
            other => Err(GestureParseError(other.to_string())),
        }
    }
}

/// Open/closed classification of a hand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HandGesture {
    pub label: HandGestureLabel,
    pub confidence: f64,
}

impl HandGesture {
    /// Parse a raw classifier label. Unknown labels are rejected.
    pub fn from_raw(label: &str, confidence: f64) -> Result<Self, GestureParseError> {
        Ok(Self {
            label: label.parse()?,
            confidence,
        })
    }
}

/// One detected hand.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct HandDetection {
    pub chirality: Chirality,
    pub gesture: Option<HandGesture>,
    pub joints: Vec<JointPosition>,
}

impl HandDetection {
    pub fn new(chirality: Chirality) -> Self {
        Self {
            chirality,
            gesture: None,
            joints: Vec::new(),
        }
    }

    /// Builder-style joint insertion.
    pub fn with_joint(mut self, joint: JointPosition) -> Self {
        self.set_joint(joint);
        self
    }

    /// Insert or replace a joint by name.
    pub fn set_joint(&mut self, joint: JointPosition) {
        match self.joints.iter_mut().find(|j| j.name == joint.name) {
            Some(existing) => *existing = joint,
            None => self.joints.push(joint),
        }
    }

    pub fn joint(&self, name: JointName) -> Option<&JointPosition> {
        self.joints.iter().find(|j| j.name == name)
    }

    /// Joints used for proximity matching, in [`HOLDING_JOINTS`] order.
    pub fn holding_positions(&self) -> impl Iterator<Item = &JointPosition> + '_ {
        HOLDING_JOINTS.iter().filter_map(move |name| self.joint(*name))
    }
}

/// All hands detected in one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct HandDetectionOutcome {
    pub hands: Vec<HandDetection>,
}

impl HandDetectionOutcome {
    pub fn new(hands: Vec<HandDetection>) -> Self {
        Self { hands }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn add_hand(&mut self, hand: HandDetection) {
        self.hands.push(hand);
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }
}
