//! Sliding-window temporal voting.
//!
//! A single frame's detections are not trusted on their own. Frames are
//! buffered until some classification has appeared in `vote_threshold` of
//! them, or the window is full, and only then is a [`CompiledResult`]
//! published. When the remaining window can no longer lift any
//! classification to the threshold, the window is abandoned early with an
//! empty result instead of waiting it out.

use tagma_models::{
    Classification, ClassificationSet, CompiledResult, HandDetectionOutcome, HeldResult,
};
use tracing::{debug, info};

use crate::completion::StructuralCompletionEvaluator;
use crate::config::{CompilerConfig, DetectionConfig};
use crate::error::VisionResult;
use crate::frame_set::FrameDetectionSet;
use crate::metrics;
use crate::proximity::ProximityAssociator;

#[derive(Debug, Clone)]
struct BufferedFrame {
    objects: FrameDetectionSet,
    held: HeldResult,
    complete: bool,
}

/// Votes over consecutive frames. Frames must be added in capture order.
#[derive(Debug, Clone)]
pub struct TemporalCompiler {
    config: CompilerConfig,
    associator: ProximityAssociator,
    evaluator: StructuralCompletionEvaluator,
    buffer: Vec<BufferedFrame>,
    results: CompiledResult,
    new_results_ready: bool,
}

impl TemporalCompiler {
    pub fn new(config: CompilerConfig) -> VisionResult<Self> {
        Self::with_associator(config, ProximityAssociator::default())
    }

    pub fn from_config(config: &DetectionConfig) -> VisionResult<Self> {
        config.validate()?;
        Self::with_associator(config.compiler, ProximityAssociator::from_config(config))
    }

    pub fn with_associator(
        config: CompilerConfig,
        associator: ProximityAssociator,
    ) -> VisionResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            associator,
            evaluator: StructuralCompletionEvaluator::new(),
            buffer: Vec::with_capacity(config.window_size),
            results: CompiledResult::default(),
            new_results_ready: false,
        })
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Add one frame's merged detections and the hands seen with it.
    ///
    /// Returns `true` when this frame caused a result to be published.
    pub fn add_outcome(
        &mut self,
        objects: FrameDetectionSet,
        hands: &HandDetectionOutcome,
    ) -> bool {
        let held = self.associator.associate(&objects, hands);
        let complete = self.evaluator.evaluate(&objects);
        self.buffer.push(BufferedFrame {
            objects,
            held,
            complete,
        });

        let window = self.config.window_size;
        let vote = self.config.vote_threshold;
        let len = self.buffer.len();

        let accepted = self.accepted(vote);
        if !accepted.is_empty() || len >= window {
            let results = self.compile(accepted);
            self.publish(results, false);
            return true;
        }

        // With `window - len` frames left, a classification seen `n` times
        // can still reach `vote` only if `n >= len + vote - window`.
        // Validation guarantees `vote <= window`, so the bar is at least 1.
        if len + vote > window {
            let early_threshold = len + vote - window;
            if self.accepted(early_threshold).is_empty() {
                debug!(
                    buffered = len,
                    early_threshold,
                    "No classification can reach the vote threshold, abandoning window"
                );
                self.publish(CompiledResult::default(), true);
                return true;
            }
        }
        false
    }

    /// The last published result. Clears the new-results flag; calling
    /// again before the next publish returns the same result.
    pub fn retrieve_results(&mut self) -> CompiledResult {
        self.new_results_ready = false;
        self.results.clone()
    }

    pub fn has_new_results(&self) -> bool {
        self.new_results_ready
    }

    /// Drop buffered frames without publishing.
    pub fn clear_outcomes(&mut self) {
        if !self.buffer.is_empty() {
            debug!(discarded = self.buffer.len(), "Clearing buffered outcomes");
        }
        self.buffer.clear();
    }

    /// Frames buffered in the current window.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Classifications present in at least `threshold` buffered frames.
    fn accepted(&self, threshold: usize) -> ClassificationSet {
        let mut tally = [0usize; Classification::COUNT];
        for frame in &self.buffer {
            for classification in frame.objects.classifications() {
                tally[classification.index()] += 1;
            }
        }
        Classification::ALL
            .into_iter()
            .filter(|c| tally[c.index()] >= threshold)
            .collect()
    }

    fn compile(&self, detected: ClassificationSet) -> CompiledResult {
        let held: ClassificationSet = self
            .buffer
            .iter()
            .flat_map(|frame| frame.held.held.iter().copied())
            .filter(|c| detected.contains(c))
            .collect();
        let maybe_held: ClassificationSet = self
            .buffer
            .iter()
            .flat_map(|frame| frame.held.maybe_held.iter().copied())
            .filter(|c| detected.contains(c))
            .collect();

        let hands_used = self.agreed_hands_used().min(held.len());

        let complete_frames = self.buffer.iter().filter(|frame| frame.complete).count();
        let completion_confidence = if self.buffer.is_empty() {
            0.0
        } else {
            complete_frames as f64 / self.buffer.len() as f64
        };

        CompiledResult {
            detected,
            held,
            maybe_held,
            hands_used,
            is_complete: complete_frames >= self.config.completion_threshold,
            completion_confidence,
        }
    }

    /// Largest per-frame hand count seen in at least `vote_threshold`
    /// frames, falling back to the first frame's count.
    fn agreed_hands_used(&self) -> usize {
        let mut groups: Vec<(usize, usize)> = Vec::new();
        for frame in &self.buffer {
            let value = frame.held.hands_used;
            match groups.iter_mut().find(|(v, _)| *v == value) {
                Some((_, count)) => *count += 1,
                None => groups.push((value, 1)),
            }
        }
        groups.sort_by(|a, b| b.0.cmp(&a.0));

        groups
            .iter()
            .find(|(_, count)| *count >= self.config.vote_threshold)
            .map(|(value, _)| *value)
            .or_else(|| self.buffer.first().map(|frame| frame.held.hands_used))
            .unwrap_or(0)
    }

    fn publish(&mut self, results: CompiledResult, early_abandon: bool) {
        info!(
            frames = self.buffer.len(),
            detected = results.detected.len(),
            held = results.held.len(),
            hands_used = results.hands_used,
            is_complete = results.is_complete,
            early_abandon,
            "Publishing compiled results"
        );
        metrics::record_result_published(early_abandon);

        self.buffer.clear();
        self.results = results;
        self.new_results_ready = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagma_models::{
        Chirality, Detection, FrameSize, HandDetection, JointName, JointPosition, NormalizedRect,
        Point,
    };

    const FRAME: FrameSize = FrameSize {
        width: 504,
        height: 896,
    };

    fn frame(classifications: &[Classification]) -> FrameDetectionSet {
        FrameDetectionSet::from_detections(
            FRAME,
            classifications
                .iter()
                .map(|c| Detection::new(NormalizedRect::new(0.4, 0.4, 0.2, 0.2), *c, 0.9)),
        )
    }

    fn part(c: Classification, x: f64, y: f64, w: f64, h: f64) -> Detection {
        Detection::new(NormalizedRect::new(x, y, w, h), c, 0.9)
    }

    fn no_hands() -> HandDetectionOutcome {
        HandDetectionOutcome::empty()
    }

    fn config(window_size: usize, vote_threshold: usize) -> CompilerConfig {
        CompilerConfig {
            window_size,
            vote_threshold,
            completion_threshold: 1,
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(TemporalCompiler::new(config(3, 4)).is_err());
    }

    #[test]
    fn test_publishes_when_vote_threshold_reached() {
        let mut compiler = TemporalCompiler::new(CompilerConfig::default()).unwrap();
        assert!(!compiler.add_outcome(frame(&[Classification::Head]), &no_hands()));
        assert!(!compiler.add_outcome(frame(&[Classification::Head]), &no_hands()));
        assert!(!compiler.has_new_results());
        assert!(compiler.add_outcome(frame(&[Classification::Head]), &no_hands()));

        assert!(compiler.has_new_results());
        assert_eq!(compiler.buffered_len(), 0);
        let results = compiler.retrieve_results();
        assert_eq!(results.detected, [Classification::Head].into_iter().collect());
    }

    #[test]
    fn test_three_of_ten_frames_accepted() {
        let mut compiler = TemporalCompiler::new(config(10, 3)).unwrap();
        for _ in 0..7 {
            assert!(!compiler.add_outcome(frame(&[]), &no_hands()));
        }
        assert!(!compiler.add_outcome(frame(&[Classification::Thorax]), &no_hands()));
        assert!(!compiler.add_outcome(frame(&[Classification::Thorax]), &no_hands()));
        assert!(compiler.add_outcome(frame(&[Classification::Thorax]), &no_hands()));

        let results = compiler.retrieve_results();
        assert_eq!(results.detected, [Classification::Thorax].into_iter().collect());
    }

    #[test]
    fn test_early_abandon_publishes_empty_result() {
        let mut compiler = TemporalCompiler::new(config(8, 3)).unwrap();
        for _ in 0..5 {
            assert!(!compiler.add_outcome(frame(&[]), &no_hands()));
        }
        // Sixth empty frame: two frames left, nothing seen yet.
        assert!(compiler.add_outcome(frame(&[]), &no_hands()));
        let results = compiler.retrieve_results();
        assert!(results.has_no_detections());
        assert_eq!(results.hands_used, 0);
        assert!(!results.is_complete);
    }

    #[test]
    fn test_early_abandon_never_drops_a_reachable_classification() {
        let window = 6;
        let vote = 3;
        for mask in 0u32..(1 << window) {
            let mut compiler = TemporalCompiler::new(config(window, vote)).unwrap();
            let mut seen = 0;
            for i in 0..window {
                let present = mask & (1 << i) != 0;
                if present {
                    seen += 1;
                }
                let classifications: &[Classification] =
                    if present { &[Classification::Abdomen] } else { &[] };
                let len = compiler.buffered_len() + 1;
                if compiler.add_outcome(frame(classifications), &no_hands()) {
                    let results = compiler.retrieve_results();
                    if results.has_no_detections() && len < window {
                        assert!(seen + (window - len) < vote, "mask {mask:#b} frame {i}");
                    }
                    if !results.has_no_detections() {
                        assert!(seen >= vote);
                    }
                    seen = 0;
                }
            }
        }
    }

    #[test]
    fn test_full_window_of_nothing_is_empty_result() {
        let mut compiler = TemporalCompiler::new(config(10, 3)).unwrap();
        let mut published = 0;
        for _ in 0..10 {
            if compiler.add_outcome(frame(&[]), &no_hands()) {
                published += 1;
                let results = compiler.retrieve_results();
                assert!(results.has_no_detections());
                assert_eq!(results.hands_used, 0);
                assert!(!results.is_complete);
            }
        }
        assert!(published >= 1);
    }

    #[test]
    fn test_retrieve_clears_flag_but_keeps_value() {
        let mut compiler = TemporalCompiler::new(config(3, 1)).unwrap();
        compiler.add_outcome(frame(&[Classification::LeftWing]), &no_hands());

        let first = compiler.retrieve_results();
        assert!(!compiler.has_new_results());
        let second = compiler.retrieve_results();
        assert_eq!(first, second);
        assert!(!compiler.has_new_results());
    }

    #[test]
    fn test_clear_outcomes_discards_buffer() {
        let mut compiler = TemporalCompiler::new(CompilerConfig::default()).unwrap();
        compiler.add_outcome(frame(&[Classification::Head]), &no_hands());
        compiler.add_outcome(frame(&[Classification::Head]), &no_hands());
        compiler.clear_outcomes();
        assert_eq!(compiler.buffered_len(), 0);

        assert!(!compiler.add_outcome(frame(&[Classification::Head]), &no_hands()));
        assert!(!compiler.has_new_results());
    }

    fn hand_on(center: Point) -> HandDetection {
        HandDetection::new(Chirality::Unknown).with_joint(JointPosition::new(
            JointName::ThumbTip,
            center,
            0.9,
        ))
    }

    #[test]
    fn test_two_hands_holding_two_parts() {
        let objects = || {
            FrameDetectionSet::from_detections(
                FRAME,
                [
                    part(Classification::Head, 0.1, 0.1, 0.1, 0.1),
                    part(Classification::Abdomen, 0.7, 0.7, 0.1, 0.1),
                ],
            )
        };
        let hands = HandDetectionOutcome::new(vec![
            hand_on(Point::new(0.15, 0.15)),
            hand_on(Point::new(0.75, 0.75)),
        ]);

        let mut compiler = TemporalCompiler::new(CompilerConfig::default()).unwrap();
        for _ in 0..3 {
            compiler.add_outcome(objects(), &hands);
        }
        let results = compiler.retrieve_results();
        assert_eq!(results.hands_used, 2);
        assert_eq!(
            results.held,
            [Classification::Head, Classification::Abdomen].into_iter().collect()
        );
    }

    #[test]
    fn test_held_filtered_to_detected_and_hands_clamped() {
        // Head is held in one frame only, so it never reaches the vote.
        let mut compiler = TemporalCompiler::new(config(8, 3)).unwrap();
        let head_frame = FrameDetectionSet::from_detections(
            FRAME,
            [
                part(Classification::Head, 0.1, 0.1, 0.1, 0.1),
                part(Classification::Thorax, 0.4, 0.4, 0.2, 0.2),
            ],
        );
        let hands = HandDetectionOutcome::new(vec![hand_on(Point::new(0.15, 0.15))]);

        compiler.add_outcome(head_frame, &hands);
        compiler.add_outcome(frame(&[Classification::Thorax]), &no_hands());
        assert!(compiler.add_outcome(frame(&[Classification::Thorax]), &no_hands()));

        let results = compiler.retrieve_results();
        assert_eq!(results.detected, [Classification::Thorax].into_iter().collect());
        assert!(results.held.is_empty());
        assert!(results.maybe_held.is_empty());
        // First frame reports one hand, but nothing held survives the filter.
        assert_eq!(results.hands_used, 0);
    }

    #[test]
    fn test_hands_used_prefers_largest_corroborated_count() {
        let mut compiler = TemporalCompiler::new(config(8, 2)).unwrap();
        let push = |compiler: &mut TemporalCompiler, hands_used: usize| {
            compiler.buffer.push(BufferedFrame {
                objects: FrameDetectionSet::new(FRAME),
                held: HeldResult {
                    held: [Classification::Head, Classification::Thorax]
                        .into_iter()
                        .collect(),
                    maybe_held: ClassificationSet::new(),
                    hands_used,
                },
                complete: false,
            });
        };
        push(&mut compiler, 1);
        push(&mut compiler, 2);
        push(&mut compiler, 1);
        push(&mut compiler, 2);
        push(&mut compiler, 3);
        assert_eq!(compiler.agreed_hands_used(), 2);

        compiler.buffer.clear();
        push(&mut compiler, 3);
        push(&mut compiler, 1);
        assert_eq!(compiler.agreed_hands_used(), 3);
    }

    fn assembled() -> FrameDetectionSet {
        FrameDetectionSet::from_detections(
            FrameSize::new(1000, 1000),
            [
                part(Classification::Thorax, 0.4, 0.4, 0.2, 0.2),
                part(Classification::Head, 0.4, 0.2, 0.2, 0.25),
                part(Classification::Abdomen, 0.4, 0.55, 0.2, 0.25),
                part(Classification::LeftWing, 0.2, 0.4, 0.25, 0.2),
                part(Classification::RightWing, 0.55, 0.4, 0.25, 0.2),
            ],
        )
    }

    #[test]
    fn test_completion_votes_across_frames() {
        let mut compiler = TemporalCompiler::new(CompilerConfig {
            window_size: 8,
            vote_threshold: 3,
            completion_threshold: 3,
        })
        .unwrap();
        compiler.add_outcome(assembled(), &no_hands());
        compiler.add_outcome(assembled(), &no_hands());
        assert!(compiler.add_outcome(assembled(), &no_hands()));

        let results = compiler.retrieve_results();
        assert_eq!(results.detected.len(), Classification::COUNT);
        assert!(results.is_complete);
        assert!((results.completion_confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_completion_below_threshold() {
        let mut compiler = TemporalCompiler::new(CompilerConfig {
            window_size: 8,
            vote_threshold: 3,
            completion_threshold: 3,
        })
        .unwrap();
        // Every part stacked on the same spot.
        let incomplete = || frame(&Classification::ALL);
        compiler.add_outcome(assembled(), &no_hands());
        compiler.add_outcome(incomplete(), &no_hands());
        assert!(compiler.add_outcome(incomplete(), &no_hands()));

        let results = compiler.retrieve_results();
        assert_eq!(results.detected.len(), Classification::COUNT);
        assert!(!results.is_complete);
        assert!((results.completion_confidence - 1.0 / 3.0).abs() < 1e-12);
    }
}
