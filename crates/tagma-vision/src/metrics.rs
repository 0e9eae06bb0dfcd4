//! Metrics emitted by the detection pipeline.
//!
//! Uses the `metrics` facade; nothing is recorded unless the host installs a
//! recorder.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    // Ensemble metrics
    pub const CYCLES_STARTED_TOTAL: &str = "tagma_ensemble_cycles_started_total";
    pub const CYCLES_COMPLETED_TOTAL: &str = "tagma_ensemble_cycles_completed_total";
    pub const CYCLE_DURATION_SECONDS: &str = "tagma_ensemble_cycle_duration_seconds";
    pub const FRAMES_DROPPED_TOTAL: &str = "tagma_frames_dropped_total";
    pub const SUB_DETECTION_FAILURES_TOTAL: &str = "tagma_sub_detection_failures_total";

    // Voting metrics
    pub const RESULTS_PUBLISHED_TOTAL: &str = "tagma_results_published_total";
    pub const EARLY_ABANDONS_TOTAL: &str = "tagma_early_abandons_total";
}

/// Record an ensemble cycle accepted by `predict`.
pub fn record_cycle_started() {
    counter!(names::CYCLES_STARTED_TOTAL).increment(1);
}

/// Record an ensemble cycle whose barrier reached all sub-detectors.
pub fn record_cycle_completed(duration_secs: f64) {
    counter!(names::CYCLES_COMPLETED_TOTAL).increment(1);
    histogram!(names::CYCLE_DURATION_SECONDS).record(duration_secs);
}

/// Record a frame dropped because the stage was busy.
pub fn record_frame_dropped(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::FRAMES_DROPPED_TOTAL, &labels).increment(1);
}

/// Record a sub-detection that contributed nothing because it failed.
pub fn record_sub_detection_failure(source: &str, kind: &str) {
    let labels = [("source", source.to_string()), ("kind", kind.to_string())];
    counter!(names::SUB_DETECTION_FAILURES_TOTAL, &labels).increment(1);
}

/// Record a compiled result publish.
pub fn record_result_published(early_abandon: bool) {
    counter!(names::RESULTS_PUBLISHED_TOTAL).increment(1);
    if early_abandon {
        counter!(names::EARLY_ABANDONS_TOTAL).increment(1);
    }
}
