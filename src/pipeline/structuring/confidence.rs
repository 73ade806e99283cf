use crate::engine_config::PenaltyTable;
use crate::models::enums::{IssueKind, Severity};

/// Confidence bands for reviewers reading marker confidence.
pub mod thresholds {
    /// Below this: the marker should not be used without re-reading the transcript
    pub const LOW: f32 = 0.50;

    /// Below this: at least one field is doubtful
    pub const MODERATE: f32 = 0.70;

    /// Above this: stated explicitly with no findings against it
    pub const HIGH: f32 = 0.85;
}

/// Lower `confidence` by the penalty for one finding. Never raises it and
/// never goes below zero.
pub fn apply_penalty(
    confidence: f32,
    table: &PenaltyTable,
    kind: IssueKind,
    severity: Severity,
) -> f32 {
    let penalty = table.penalty(kind, severity).max(0.0);
    (confidence - penalty).clamp(0.0, confidence.max(0.0))
}

/// Human-readable band for a confidence value.
pub fn confidence_band(confidence: f32) -> &'static str {
    if confidence >= thresholds::HIGH {
        "high"
    } else if confidence >= thresholds::MODERATE {
        "moderate"
    } else if confidence >= thresholds::LOW {
        "low"
    } else {
        "very low"
    }
}
