//! Engine tunables: qualifier window, base confidence per extraction rule,
//! and the per-kind confidence penalty table.
//!
//! Every value here is versioned and serializable so that a batch output can
//! name exactly which table produced its confidences.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::enums::{IssueKind, ResultSource, Severity};
use crate::pipeline::structuring::IhcError;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Starting confidence for a candidate, by the rule that produced its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseConfidence {
    /// Result stated right after the marker ("ER positive").
    pub explicit: f32,
    /// Result from a governing lead-in ("positive for ER, PR").
    pub lead_in: f32,
    /// Result shared across a list ("ER, PR and HER2 negative").
    pub shared_list: f32,
    /// Result inferred from attributes (only with `allow_inference`).
    pub inferred: f32,
    /// Marker name outside the vocabulary.
    pub unknown_marker: f32,
}

impl Default for BaseConfidence {
    fn default() -> Self {
        Self {
            explicit: 0.95,
            lead_in: 0.90,
            shared_list: 0.85,
            inferred: 0.60,
            unknown_marker: 0.50,
        }
    }
}

/// Penalty pair for one issue kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KindPenalty {
    pub error: f32,
    pub warning: f32,
}

impl KindPenalty {
    const fn new(error: f32, warning: f32) -> Self {
        Self { error, warning }
    }
}

/// Confidence penalties subtracted per finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyTable {
    pub version: String,
    pub contradiction: KindPenalty,
    pub missing_field: KindPenalty,
    pub invalid_pattern: KindPenalty,
    pub unknown_marker: KindPenalty,
    pub uncertain_value: KindPenalty,
}

impl Default for PenaltyTable {
    fn default() -> Self {
        Self {
            version: "penalties-v1".into(),
            contradiction: KindPenalty::new(0.40, 0.20),
            missing_field: KindPenalty::new(0.30, 0.15),
            invalid_pattern: KindPenalty::new(0.35, 0.10),
            unknown_marker: KindPenalty::new(0.25, 0.25),
            uncertain_value: KindPenalty::new(0.15, 0.15),
        }
    }
}

impl PenaltyTable {
    /// Penalty for a finding. Diagnostic leakage is case-level and costs no
    /// marker confidence.
    pub fn penalty(&self, kind: IssueKind, severity: Severity) -> f32 {
        let pair = match kind {
            IssueKind::Contradiction => self.contradiction,
            IssueKind::MissingField => self.missing_field,
            IssueKind::InvalidPattern => self.invalid_pattern,
            IssueKind::UnknownMarker => self.unknown_marker,
            IssueKind::UncertainValue => self.uncertain_value,
            IssueKind::DiagnosticLeak => return 0.0,
        };
        match severity {
            Severity::Error => pair.error,
            Severity::Warning => pair.warning,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of tokens after a marker mention scanned for qualifiers.
    pub qualifier_window_tokens: usize,
    pub base_confidence: BaseConfidence,
    pub penalties: PenaltyTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            qualifier_window_tokens: 12,
            base_confidence: BaseConfidence::default(),
            penalties: PenaltyTable::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════

impl EngineConfig {
    /// Load a config from JSON. Missing fields fall back to defaults.
    pub fn from_json_path(path: &Path) -> Result<Self, IhcError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.check()?;
        tracing::info!(
            path = %path.display(),
            penalties = %config.penalties.version,
            "Engine config loaded"
        );
        Ok(config)
    }

    /// Reject tables that would break confidence ordering.
    pub fn check(&self) -> Result<(), IhcError> {
        if self.qualifier_window_tokens == 0 {
            return Err(IhcError::InvalidConfig(
                "qualifier_window_tokens must be at least 1".into(),
            ));
        }
        let p = &self.penalties;
        for (name, pair) in [
            ("contradiction", p.contradiction),
            ("missing_field", p.missing_field),
            ("invalid_pattern", p.invalid_pattern),
            ("unknown_marker", p.unknown_marker),
            ("uncertain_value", p.uncertain_value),
        ] {
            if pair.error < pair.warning || pair.warning < 0.0 {
                return Err(IhcError::InvalidConfig(format!(
                    "penalty for {name}: error must be >= warning >= 0"
                )));
            }
        }
        Ok(())
    }

    /// Base confidence for a candidate of a known marker.
    pub fn base_for(&self, source: ResultSource) -> f32 {
        let b = &self.base_confidence;
        match source {
            ResultSource::Explicit => b.explicit,
            ResultSource::LeadIn => b.lead_in,
            ResultSource::SharedList => b.shared_list,
            ResultSource::Inferred => b.inferred,
            // A mention with no result still starts from the explicit rule;
            // the missing result is penalised by the validator.
            ResultSource::Absent => b.explicit,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
