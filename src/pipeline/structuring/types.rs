use serde::{Deserialize, Serialize};

use super::normalize::NormalizedText;
use crate::models::enums::{
    CaseStatus, Extent, InputType, Intensity, IssueKind, MarkerResult, PercentBound, ResultSource,
    Severity, StainPattern,
};

// ── Input ───────────────────────────────────────────────────────────────

/// One paragraph of transcript plus its envelope. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub input_id: String,
    #[serde(default = "default_input_type")]
    pub input_type: InputType,
    pub raw_text: String,
    #[serde(default)]
    pub context: CaseContext,
    #[serde(default)]
    pub options: CaseOptions,
    #[serde(default)]
    pub metadata: CaseMetadata,
}

fn default_input_type() -> InputType {
    InputType::Text
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseContext {
    pub case_id: Option<String>,
    pub specimen_id: Option<String>,
    pub panel_hint: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseOptions {
    #[serde(default)]
    pub strict_mode: bool,
    #[serde(default)]
    pub allow_inference: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseMetadata {
    pub source: Option<String>,
    pub language: Option<String>,
    pub locale: Option<String>,
}

// ── Extraction ──────────────────────────────────────────────────────────

/// Verbatim span of normalized case text backing a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSpan {
    pub text: String,
    /// Byte offset into the normalized case text.
    pub start: usize,
    pub end: usize,
}

/// Approximate percent given as a range ("10-20%").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentRange {
    pub low: u32,
    pub high: u32,
}

/// One marker mention with its structured qualifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerCandidate {
    /// Canonical name for vocabulary markers, verbatim token otherwise.
    pub marker: String,
    /// Whether `marker` is in the canonical vocabulary.
    pub recognized: bool,
    pub result: Option<MarkerResult>,
    pub result_source: ResultSource,
    pub pattern: Option<StainPattern>,
    pub intensity: Option<Intensity>,
    /// Parsed as written; values above 100 are kept and flagged.
    pub percent: Option<u32>,
    /// Set when `percent` was dictated as a bound ("<1%") rather than a value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_bound: Option<PercentBound>,
    pub percent_range: Option<PercentRange>,
    pub extent: Option<Extent>,
    pub controls: Option<String>,
    pub comment: Option<String>,
    pub evidence: Vec<EvidenceSpan>,
    pub confidence: f32,
    /// Hedged wording ("maybe", "around") near the mention.
    #[serde(skip)]
    pub hedged: bool,
    /// Further results stated for the same mention ("positive, sorry, negative").
    #[serde(skip)]
    pub conflicting_results: Vec<MarkerResult>,
}

impl MarkerCandidate {
    pub fn new(marker: impl Into<String>, recognized: bool, confidence: f32) -> Self {
        Self {
            marker: marker.into(),
            recognized,
            result: None,
            result_source: ResultSource::Absent,
            pattern: None,
            intensity: None,
            percent: None,
            percent_bound: None,
            percent_range: None,
            extent: None,
            controls: None,
            comment: None,
            evidence: Vec::new(),
            confidence,
            hedged: false,
            conflicting_results: Vec::new(),
        }
    }

    /// Evidence text joined for issue reporting.
    pub fn evidence_text(&self) -> String {
        self.evidence
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Whether any attribute besides the result was extracted.
    pub fn has_supporting_attributes(&self) -> bool {
        self.pattern.is_some()
            || self.intensity.is_some()
            || self.percent.is_some_and(|p| p > 0)
            || self.percent_range.is_some()
            || self.extent.is_some()
    }
}

// ── Validation ──────────────────────────────────────────────────────────

/// A finding raised by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    /// Stable machine-readable code, e.g. `CONTRADICTORY_RESULT`.
    pub code: String,
    /// `None` for case-level findings.
    pub marker: Option<String>,
    pub message: String,
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

// ── Output ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IhcPanel {
    pub panel_name: Option<String>,
    pub case_id: Option<String>,
    pub specimen_id: Option<String>,
    pub markers: Vec<MarkerCandidate>,
}

/// One table row per validated marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub marker: String,
    pub result: String,
    pub pattern: Option<String>,
    pub intensity: Option<String>,
    pub percent: Option<String>,
    pub extent: Option<String>,
    pub controls: Option<String>,
    pub comment: Option<String>,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rendered {
    pub narrative: Option<String>,
    pub table: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_type: InputType,
    pub extraction_model: String,
    pub version: String,
    pub vocabulary_version: String,
    pub penalty_table_version: String,
    pub source: Option<String>,
    pub language: Option<String>,
    pub locale: Option<String>,
}

/// Complete output record for one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedCase {
    pub output_id: String,
    pub input_id: String,
    pub status: CaseStatus,
    pub ihc: IhcPanel,
    pub rendered: Rendered,
    /// Text the evidence offsets point into, with each alias rewrite made
    /// from the dictated wording.
    pub normalized: NormalizedText,
    pub validation: ValidationReport,
    pub provenance: Provenance,
}

/// Turns one case into its output record (allows mocking the engine).
pub trait CaseProcessor {
    fn process_case(&self, case: &Case) -> ProcessedCase;
}
