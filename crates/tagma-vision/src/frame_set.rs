//! Per-frame detections keyed by classification.
//!
//! Storage is a fixed arena with one slot per [`Classification`]. Each slot
//! keeps the raw detections added since the last merge plus a running merged
//! state (union box, confidence sum and weight). Merging folds the raw
//! detections into the running state, so the merged confidence is always the
//! plain average over every detection ever contributed, regardless of how
//! many merges happened in between.

use tagma_models::{Classification, Detection, FrameSize, NormalizedRect};

#[derive(Debug, Clone, Copy, PartialEq)]
struct MergedSlot {
    bbox: NormalizedRect,
    confidence_sum: f64,
    weight: u64,
}

impl MergedSlot {
    fn fold(self, other: MergedSlot) -> MergedSlot {
        MergedSlot {
            bbox: self.bbox.union(&other.bbox),
            confidence_sum: self.confidence_sum + other.confidence_sum,
            weight: self.weight + other.weight,
        }
    }

    fn from_detection(detection: &Detection) -> MergedSlot {
        MergedSlot {
            bbox: *detection.bbox(),
            confidence_sum: detection.confidence,
            weight: 1,
        }
    }

    fn to_detection(self, classification: Classification) -> Detection {
        Detection::new(
            self.bbox,
            classification,
            self.confidence_sum / self.weight as f64,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Slot {
    pending: Vec<Detection>,
    merged: Option<MergedSlot>,
}

impl Slot {
    fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.merged.is_none()
    }

    /// Merged state including pending detections, without mutating.
    fn consolidated(&self) -> Option<MergedSlot> {
        self.pending
            .iter()
            .map(MergedSlot::from_detection)
            .fold(self.merged, |acc, next| match acc {
                Some(merged) => Some(merged.fold(next)),
                None => Some(next),
            })
    }

    fn merge(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.merged = self.consolidated();
        self.pending.clear();
    }

    fn weight(&self) -> u64 {
        self.merged.map_or(0, |m| m.weight) + self.pending.len() as u64
    }
}

/// Detections for one frame, indexed by classification.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDetectionSet {
    frame_size: FrameSize,
    slots: [Slot; Classification::COUNT],
}

impl FrameDetectionSet {
    pub fn new(frame_size: FrameSize) -> Self {
        Self {
            frame_size,
            slots: std::array::from_fn(|_| Slot::default()),
        }
    }

    /// Build a set from detections and merge it.
    pub fn from_detections(
        frame_size: FrameSize,
        detections: impl IntoIterator<Item = Detection>,
    ) -> Self {
        let mut set = Self::new(frame_size);
        for detection in detections {
            set.add_detection(detection);
        }
        set.merge();
        set
    }

    /// Pixel size of the frame the detections belong to.
    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    pub fn add_detection(&mut self, detection: Detection) {
        self.slots[detection.classification.index()]
            .pending
            .push(detection);
    }

    /// Collapse every classification to a single detection: the union of all
    /// its boxes with the weighted-average confidence.
    pub fn merge(&mut self) {
        for slot in &mut self.slots {
            slot.merge();
        }
    }

    /// Fold another set into this one. Already-merged state is combined by
    /// summing confidences and weights; raw detections stay pending.
    pub fn absorb(&mut self, other: FrameDetectionSet) {
        for (slot, other) in self.slots.iter_mut().zip(other.slots) {
            if let Some(incoming) = other.merged {
                slot.merged = Some(match slot.merged {
                    Some(existing) => existing.fold(incoming),
                    None => incoming,
                });
            }
            slot.pending.extend(other.pending);
        }
    }

    /// Every stored detection in classification order. After [`merge`]
    /// there is at most one per classification.
    ///
    /// [`merge`]: FrameDetectionSet::merge
    pub fn detections(&self) -> Vec<Detection> {
        let mut detections = Vec::new();
        for (classification, slot) in Classification::ALL.iter().zip(&self.slots) {
            if let Some(merged) = slot.merged {
                detections.push(merged.to_detection(*classification));
            }
            detections.extend(slot.pending.iter().cloned());
        }
        detections
    }

    /// The single detection this classification merges to, if present.
    pub fn get(&self, classification: Classification) -> Option<Detection> {
        self.slots[classification.index()]
            .consolidated()
            .map(|merged| merged.to_detection(classification))
    }

    pub fn contains(&self, classification: Classification) -> bool {
        !self.slots[classification.index()].is_empty()
    }

    /// Classifications present in this frame, in declaration order.
    pub fn classifications(&self) -> impl Iterator<Item = Classification> + '_ {
        Classification::ALL
            .into_iter()
            .filter(move |c| self.contains(*c))
    }

    /// Total detections ever contributed to this classification.
    pub fn weight(&self, classification: Classification) -> u64 {
        self.slots[classification.index()].weight()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Slot::is_empty)
    }

    /// Number of classifications present.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_empty()).count()
    }
}
