// Conservative validation of extracted marker candidates.
// Every finding is reported with a stable code; findings tied to a marker
// lower that marker's confidence, case-level findings do not.

use std::collections::HashMap;

use super::confidence::apply_penalty;
use super::suggest::closest_marker;
use super::types::{CaseOptions, MarkerCandidate, ValidationIssue, ValidationReport};
use super::vocabulary::MarkerVocabulary;
use crate::engine_config::EngineConfig;
use crate::models::enums::{
    Intensity, IssueKind, MarkerResult, PercentBound, ResultSource, Severity,
};
use crate::pipeline::safety::scan_diagnostic_language;

/// Stable issue codes.
pub mod codes {
    pub const NO_MARKERS_FOUND: &str = "NO_MARKERS_FOUND";
    pub const RESULT_MISSING: &str = "RESULT_MISSING";
    pub const INTENSITY_REQUIRED_MISSING: &str = "INTENSITY_REQUIRED_MISSING";
    pub const PERCENT_REQUIRED_MISSING: &str = "PERCENT_REQUIRED_MISSING";
    pub const PANEL_MARKER_MISSING: &str = "PANEL_MARKER_MISSING";
    pub const CONTRADICTORY_RESULT: &str = "CONTRADICTORY_RESULT";
    pub const CONTRADICTORY_RESULT_PERCENT: &str = "CONTRADICTORY_RESULT_PERCENT";
    pub const CONTRADICTORY_ATTRIBUTE: &str = "CONTRADICTORY_ATTRIBUTE";
    pub const PERCENT_OUT_OF_RANGE: &str = "PERCENT_OUT_OF_RANGE";
    pub const INVALID_PATTERN: &str = "INVALID_PATTERN";
    pub const UNUSUAL_PATTERN: &str = "UNUSUAL_PATTERN";
    pub const UNKNOWN_MARKER: &str = "UNKNOWN_MARKER";
    pub const PERCENT_APPROXIMATE: &str = "PERCENT_APPROXIMATE";
    pub const LOW_CONFIDENCE: &str = "LOW_CONFIDENCE";
    pub const DIAGNOSTIC_LANGUAGE_DETECTED: &str = "DIAGNOSTIC_LANGUAGE_DETECTED";
    pub const INPUT_TRUNCATED: &str = "INPUT_TRUNCATED";
}

/// What the validator needs to know about the case besides its candidates.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub input_id: &'a str,
    /// Normalized case text, scanned for diagnostic language.
    pub text: &'a str,
    pub options: CaseOptions,
    pub panel_hint: Option<&'a str>,
    /// Original character count when the transcript was cut before extraction.
    pub truncated_from: Option<usize>,
}

/// Validated markers plus the ordered findings.
#[derive(Debug, Clone)]
pub struct ValidatedCase {
    pub markers: Vec<MarkerCandidate>,
    pub report: ValidationReport,
}

impl ValidatedCase {
    /// Markers from the canonical vocabulary.
    pub fn usable_count(&self) -> usize {
        self.markers.iter().filter(|m| m.recognized).count()
    }
}

/// A finding plus the markers (indexes into the validated list) it touches.
struct Finding {
    issue: ValidationIssue,
    touches: Vec<usize>,
}

struct Findings {
    strict: bool,
    items: Vec<Finding>,
}

impl Findings {
    fn push(
        &mut self,
        kind: IssueKind,
        severity: Severity,
        code: &str,
        marker: Option<&MarkerCandidate>,
        touches: Vec<usize>,
        message: String,
    ) {
        self.items.push(Finding {
            issue: ValidationIssue {
                kind,
                severity,
                code: code.to_string(),
                marker: marker.map(|m| m.marker.clone()),
                message,
                evidence: marker.map(|m| m.evidence_text()).filter(|e| !e.is_empty()),
            },
            touches,
        });
    }

    /// Missing fields: warning, escalated to error under strict mode.
    fn missing(&mut self, code: &str, marker: &MarkerCandidate, idx: usize, message: String) {
        let severity = if self.strict { Severity::Error } else { Severity::Warning };
        self.push(IssueKind::MissingField, severity, code, Some(marker), vec![idx], message);
    }
}

/// Validate candidates for one case.
pub fn validate_candidates(
    candidates: Vec<MarkerCandidate>,
    ctx: &ValidationContext<'_>,
    vocab: &MarkerVocabulary,
    config: &EngineConfig,
) -> ValidatedCase {
    let mut findings = Findings {
        strict: ctx.options.strict_mode,
        items: Vec::new(),
    };

    let mut markers = merge_duplicates(candidates, &mut findings);

    for (idx, m) in markers.iter().enumerate() {
        check_marker(m, idx, vocab, &mut findings);
    }

    check_panel(&markers, ctx, vocab, &mut findings);
    check_diagnostic_language(ctx, &mut findings);

    if let Some(original) = ctx.truncated_from {
        findings.push(
            IssueKind::MissingField,
            Severity::Error,
            codes::INPUT_TRUNCATED,
            None,
            Vec::new(),
            format!(
                "Transcript of {original} characters was cut to {} before extraction; markers past the cut are not reported",
                ctx.text.chars().count()
            ),
        );
    }

    if !markers.iter().any(|m| m.recognized) {
        findings.push(
            IssueKind::MissingField,
            Severity::Error,
            codes::NO_MARKERS_FOUND,
            None,
            Vec::new(),
            "No recognised IHC markers found in the transcript".into(),
        );
    }

    let mut report = ValidationReport::default();
    for finding in findings.items {
        for &idx in &finding.touches {
            if let Some(m) = markers.get_mut(idx) {
                m.confidence = apply_penalty(
                    m.confidence,
                    &config.penalties,
                    finding.issue.kind,
                    finding.issue.severity,
                );
            }
        }
        match finding.issue.severity {
            Severity::Error => report.errors.push(finding.issue),
            Severity::Warning => report.warnings.push(finding.issue),
        }
    }

    if !report.errors.is_empty() {
        tracing::warn!(
            input_id = %ctx.input_id,
            error_count = report.errors.len(),
            warning_count = report.warnings.len(),
            "Validation errors detected"
        );
    }

    ValidatedCase { markers, report }
}

// ═══════════════════════════════════════════════════════════
// Duplicates and contradictions
// ═══════════════════════════════════════════════════════════

fn group_key(c: &MarkerCandidate) -> String {
    if c.recognized {
        c.marker.clone()
    } else {
        c.marker.to_lowercase()
    }
}

/// Describe why two mentions of one marker disagree, if they do.
fn disagreement(a: &MarkerCandidate, b: &MarkerCandidate) -> Option<(&'static str, String)> {
    if let (Some(ra), Some(rb)) = (a.result, b.result) {
        if ra != rb {
            return Some((
                codes::CONTRADICTORY_RESULT,
                format!("{} reported as both {ra} and {rb}", a.marker),
            ));
        }
    }
    if let (Some(pa), Some(pb)) = (a.pattern, b.pattern) {
        if pa != pb {
            return Some((
                codes::CONTRADICTORY_ATTRIBUTE,
                format!("{} reported with both {pa} and {pb} pattern", a.marker),
            ));
        }
    }
    if let (Some(ia), Some(ib)) = (a.intensity, b.intensity) {
        if ia != ib {
            return Some((
                codes::CONTRADICTORY_ATTRIBUTE,
                format!("{} reported with both {ia} and {ib} intensity", a.marker),
            ));
        }
    }
    if let (Some(pa), Some(pb)) = (a.percent, b.percent) {
        if pa != pb {
            return Some((
                codes::CONTRADICTORY_ATTRIBUTE,
                format!("{} reported at both {pa}% and {pb}%", a.marker),
            ));
        }
    }
    None
}

/// Merge consistent repeat mentions; keep disagreeing ones apart and flag them.
fn merge_duplicates(
    candidates: Vec<MarkerCandidate>,
    findings: &mut Findings,
) -> Vec<MarkerCandidate> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    for (i, c) in candidates.iter().enumerate() {
        let key = group_key(c);
        match by_key.get(&key) {
            Some(&g) => groups[g].1.push(i),
            None => {
                by_key.insert(key.clone(), groups.len());
                groups.push((key, vec![i]));
            }
        }
    }

    // Per group: the first disagreement found, if any.
    let mut conflicts: HashMap<usize, (&'static str, String)> = HashMap::new();
    for (g, (_, members)) in groups.iter().enumerate() {
        'pairs: for (n, &i) in members.iter().enumerate() {
            for &j in &members[n + 1..] {
                if let Some(found) = disagreement(&candidates[i], &candidates[j]) {
                    conflicts.insert(g, found);
                    break 'pairs;
                }
            }
        }
    }

    let mut out: Vec<MarkerCandidate> = Vec::with_capacity(candidates.len());
    let mut merged_into: HashMap<usize, usize> = HashMap::new();
    let mut conflict_members: HashMap<usize, Vec<usize>> = HashMap::new();

    for c in candidates {
        let g = by_key[&group_key(&c)];
        if conflicts.contains_key(&g) {
            conflict_members.entry(g).or_default().push(out.len());
            out.push(c);
            continue;
        }
        match merged_into.get(&g) {
            Some(&target) => merge_into(&mut out[target], c),
            None => {
                merged_into.insert(g, out.len());
                out.push(c);
            }
        }
    }

    let mut flagged: Vec<usize> = conflicts.keys().copied().collect();
    flagged.sort_unstable();
    for g in flagged {
        let (code, message) = conflicts[&g].clone();
        let touches = conflict_members.remove(&g).unwrap_or_default();
        let evidence = touches
            .iter()
            .map(|&idx| out[idx].evidence_text())
            .collect::<Vec<_>>()
            .join(" | ");
        let marker = touches.first().map(|&idx| out[idx].marker.clone());
        findings.items.push(Finding {
            issue: ValidationIssue {
                kind: IssueKind::Contradiction,
                severity: Severity::Error,
                code: code.to_string(),
                marker,
                message,
                evidence: Some(evidence),
            },
            touches,
        });
    }

    out
}

fn merge_into(target: &mut MarkerCandidate, other: MarkerCandidate) {
    if target.result.is_none() {
        target.result = other.result;
        target.result_source = other.result_source;
    }
    target.pattern = target.pattern.or(other.pattern);
    target.intensity = target.intensity.or(other.intensity);
    if target.percent.is_none() {
        target.percent = other.percent;
        target.percent_bound = other.percent_bound;
    }
    target.percent_range = target.percent_range.or(other.percent_range);
    target.extent = target.extent.or(other.extent);
    target.controls = join_distinct(target.controls.take(), other.controls);
    target.comment = join_distinct(target.comment.take(), other.comment);
    target.hedged |= other.hedged;
    for r in other.conflicting_results {
        if !target.conflicting_results.contains(&r) {
            target.conflicting_results.push(r);
        }
    }
    target.evidence.extend(other.evidence);
    target.confidence = target.confidence.min(other.confidence);
}

fn join_distinct(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) if a != b => Some(format!("{a}; {b}")),
        (a, b) => a.or(b),
    }
}

// ═══════════════════════════════════════════════════════════
// Per-marker checks
// ═══════════════════════════════════════════════════════════

fn check_marker(m: &MarkerCandidate, idx: usize, vocab: &MarkerVocabulary, findings: &mut Findings) {
    // Self-corrected or repeated result within one mention.
    if let (Some(first), false) = (m.result, m.conflicting_results.is_empty()) {
        let others = m
            .conflicting_results
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        findings.push(
            IssueKind::Contradiction,
            Severity::Error,
            codes::CONTRADICTORY_RESULT,
            Some(m),
            vec![idx],
            format!("{} stated as {first} and also as {others}", m.marker),
        );
    }

    match (m.result, m.percent) {
        (Some(MarkerResult::Negative), Some(p)) if p > 0 && !is_negative_bound(m) => findings.push(
            IssueKind::Contradiction,
            Severity::Error,
            codes::CONTRADICTORY_RESULT_PERCENT,
            Some(m),
            vec![idx],
            format!("{} is negative but {p}% of cells are reported", m.marker),
        ),
        (Some(MarkerResult::Positive), Some(0)) => findings.push(
            IssueKind::Contradiction,
            Severity::Error,
            codes::CONTRADICTORY_RESULT_PERCENT,
            Some(m),
            vec![idx],
            format!("{} is positive but 0% of cells are reported", m.marker),
        ),
        _ => {}
    }

    // Weak staining is compatible with a negative call (HER2 1+, ER <1%).
    if let (Some(MarkerResult::Negative), Some(intensity @ (Intensity::Moderate | Intensity::Strong))) =
        (m.result, m.intensity)
    {
        findings.push(
            IssueKind::Contradiction,
            Severity::Error,
            codes::CONTRADICTORY_ATTRIBUTE,
            Some(m),
            vec![idx],
            format!("{} is negative but {intensity} intensity is reported", m.marker),
        );
    }

    match m.result {
        None => findings.missing(
            codes::RESULT_MISSING,
            m,
            idx,
            format!("No result stated for {}", m.marker),
        ),
        Some(r) if m.result_source == ResultSource::Inferred => {
            findings.missing(
                codes::RESULT_MISSING,
                m,
                idx,
                format!("No result stated for {}; {r} was inferred from its attributes", m.marker),
            )
        }
        Some(_) => {}
    }

    if let Some(p) = m.percent.filter(|&p| p > 100) {
        findings.push(
            IssueKind::InvalidPattern,
            Severity::Error,
            codes::PERCENT_OUT_OF_RANGE,
            Some(m),
            vec![idx],
            format!("{} percent {p}% is outside 0-100", m.marker),
        );
    }
    if let Some(range) = m.percent_range {
        if range.low > range.high || range.high > 100 {
            findings.push(
                IssueKind::InvalidPattern,
                Severity::Error,
                codes::PERCENT_OUT_OF_RANGE,
                Some(m),
                vec![idx],
                format!("{} percent range {}-{}% is not a valid range", m.marker, range.low, range.high),
            );
        } else {
            findings.push(
                IssueKind::UncertainValue,
                Severity::Warning,
                codes::PERCENT_APPROXIMATE,
                Some(m),
                vec![idx],
                format!("{} percent given as a range ({}-{}%)", m.marker, range.low, range.high),
            );
        }
    }

    if let (Some(bound), Some(p)) = (m.percent_bound, m.percent) {
        if !is_negative_bound(m) {
            findings.push(
                IssueKind::UncertainValue,
                Severity::Warning,
                codes::PERCENT_APPROXIMATE,
                Some(m),
                vec![idx],
                format!("{} percent given as a bound ({}{p}%)", m.marker, bound.symbol()),
            );
        }
    }

    if m.hedged {
        findings.push(
            IssueKind::UncertainValue,
            Severity::Warning,
            codes::LOW_CONFIDENCE,
            Some(m),
            vec![idx],
            format!("{} is described with hedged wording", m.marker),
        );
    }

    if !m.recognized {
        let message = match closest_marker(&m.marker, vocab) {
            Some(s) => format!("Unrecognised marker '{}' (did you mean {s}?)", m.marker),
            None => format!("Unrecognised marker '{}'", m.marker),
        };
        findings.push(
            IssueKind::UnknownMarker,
            Severity::Warning,
            codes::UNKNOWN_MARKER,
            Some(m),
            vec![idx],
            message,
        );
        return;
    }

    let Some(def) = vocab.get(&m.marker) else {
        return;
    };

    if def.requirements.intensity.applies_to(m.result) && m.intensity.is_none() {
        findings.missing(
            codes::INTENSITY_REQUIRED_MISSING,
            m,
            idx,
            format!("Intensity not stated for {} {}", m.marker, result_phrase(m)),
        );
    }
    // A range satisfies the requirement; it is already reported as approximate.
    if def.requirements.percent.applies_to(m.result)
        && m.percent.is_none()
        && m.percent_range.is_none()
    {
        findings.missing(
            codes::PERCENT_REQUIRED_MISSING,
            m,
            idx,
            format!("Percent of cells not stated for {} {}", m.marker, result_phrase(m)),
        );
    }

    if let Some(pattern) = m.pattern {
        if !def.allowed_patterns.is_empty() && !def.allowed_patterns.contains(&pattern) {
            let (severity, code) = if def.hard_pattern_enforce {
                (Severity::Error, codes::INVALID_PATTERN)
            } else {
                (Severity::Warning, codes::UNUSUAL_PATTERN)
            };
            findings.push(
                IssueKind::InvalidPattern,
                severity,
                code,
                Some(m),
                vec![idx],
                format!("{pattern} staining is not an expected pattern for {}", m.marker),
            );
        }
    }
}

/// "negative (<1%)": the conventional way to report a negative nuclear stain.
fn is_negative_bound(m: &MarkerCandidate) -> bool {
    m.result == Some(MarkerResult::Negative)
        && m.percent_bound == Some(PercentBound::Below)
        && m.percent.is_some_and(|p| p <= 1)
}

fn result_phrase(m: &MarkerCandidate) -> String {
    match m.result {
        Some(r) => format!("({r})"),
        None => "(result not stated)".into(),
    }
}

// ═══════════════════════════════════════════════════════════
// Case-level checks
// ═══════════════════════════════════════════════════════════

fn check_panel(
    markers: &[MarkerCandidate],
    ctx: &ValidationContext<'_>,
    vocab: &MarkerVocabulary,
    findings: &mut Findings,
) {
    let Some(hint) = ctx.panel_hint.filter(|h| !h.trim().is_empty()) else {
        return;
    };
    let Some(panel) = vocab.panel(hint) else {
        tracing::debug!(input_id = %ctx.input_id, "Panel hint does not name a known panel");
        return;
    };

    let severity = if findings.strict { Severity::Error } else { Severity::Warning };
    for expected in &panel.markers {
        let present = markers
            .iter()
            .any(|m| m.recognized && m.marker.eq_ignore_ascii_case(expected));
        if !present {
            findings.items.push(Finding {
                issue: ValidationIssue {
                    kind: IssueKind::MissingField,
                    severity,
                    code: codes::PANEL_MARKER_MISSING.into(),
                    marker: Some(expected.clone()),
                    message: format!("{expected} expected in the {} panel but not reported", panel.name),
                    evidence: None,
                },
                touches: Vec::new(),
            });
        }
    }
}

fn check_diagnostic_language(ctx: &ValidationContext<'_>, findings: &mut Findings) {
    let leaks = scan_diagnostic_language(ctx.text);
    if leaks.is_empty() {
        return;
    }
    let severity = if findings.strict { Severity::Error } else { Severity::Warning };
    let phrases = leaks
        .iter()
        .map(|l| l.matched_text.as_str())
        .collect::<Vec<_>>()
        .join(" | ");
    findings.items.push(Finding {
        issue: ValidationIssue {
            kind: IssueKind::DiagnosticLeak,
            severity,
            code: codes::DIAGNOSTIC_LANGUAGE_DETECTED.into(),
            marker: None,
            message: format!(
                "Transcript contains diagnostic language ({} phrase(s)); IHC results should be observational",
                leaks.len()
            ),
            evidence: Some(phrases),
        },
        touches: Vec::new(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{Intensity, StainPattern};
    use crate::pipeline::structuring::types::PercentRange;

    fn vocab() -> MarkerVocabulary {
        MarkerVocabulary::builtin().unwrap()
    }

    fn ctx(strict: bool) -> ValidationContext<'static> {
        ValidationContext {
            input_id: "t",
            text: "",
            options: CaseOptions { strict_mode: strict, allow_inference: false },
            panel_hint: None,
            truncated_from: None,
        }
    }

    fn cand(marker: &str, result: Option<MarkerResult>) -> MarkerCandidate {
        let mut c = MarkerCandidate::new(marker, true, 0.95);
        c.result = result;
        c.result_source = if result.is_some() { ResultSource::Explicit } else { ResultSource::Absent };
        c
    }

    fn codes_of(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.code.as_str()).collect()
    }

    fn run(cands: Vec<MarkerCandidate>, ctx: &ValidationContext<'_>) -> ValidatedCase {
        validate_candidates(cands, ctx, &vocab(), &EngineConfig::default())
    }

    #[test]
    fn clean_marker_has_no_findings() {
        let mut c = cand("CK7", Some(MarkerResult::Positive));
        c.intensity = Some(Intensity::Strong);
        c.pattern = Some(StainPattern::Cytoplasmic);
        let v = run(vec![c], &ctx(false));
        assert!(v.report.errors.is_empty());
        assert!(v.report.warnings.is_empty());
        assert!((v.markers[0].confidence - 0.95).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_result_escalates_under_strict() {
        let lenient = run(vec![cand("CK7", None)], &ctx(false));
        assert_eq!(codes_of(&lenient.report.warnings), vec![codes::RESULT_MISSING]);
        assert!(lenient.report.errors.is_empty());

        let strict = run(vec![cand("CK7", None)], &ctx(true));
        assert_eq!(codes_of(&strict.report.errors), vec![codes::RESULT_MISSING]);
        assert!(strict.markers[0].confidence < lenient.markers[0].confidence);
    }

    #[test]
    fn contradictory_duplicates_kept_and_flagged() {
        let v = run(
            vec![cand("CK7", Some(MarkerResult::Positive)), cand("CK7", Some(MarkerResult::Negative))],
            &ctx(false),
        );
        assert_eq!(v.markers.len(), 2);
        assert!(codes_of(&v.report.errors).contains(&codes::CONTRADICTORY_RESULT));
        for m in &v.markers {
            assert!(m.confidence < 0.95, "confidence not lowered: {}", m.confidence);
        }
    }

    #[test]
    fn contradiction_is_error_even_without_strict() {
        let v = run(
            vec![cand("CDX2", Some(MarkerResult::Positive)), cand("CDX2", Some(MarkerResult::Negative))],
            &ctx(false),
        );
        assert!(v.report.errors.iter().all(|e| e.severity == Severity::Error));
        assert!(v.report.errors.iter().any(|e| e.kind == IssueKind::Contradiction));
    }

    #[test]
    fn consistent_duplicates_merge() {
        let mut a = cand("ER", Some(MarkerResult::Positive));
        a.percent = Some(90);
        a.evidence.push(crate::pipeline::structuring::types::EvidenceSpan {
            text: "ER positive 90%".into(),
            start: 0,
            end: 15,
        });
        let mut b = cand("ER", None);
        b.intensity = Some(Intensity::Strong);
        b.confidence = 0.80;
        b.evidence.push(crate::pipeline::structuring::types::EvidenceSpan {
            text: "ER strong".into(),
            start: 17,
            end: 26,
        });
        let v = run(vec![a, b], &ctx(false));
        assert_eq!(v.markers.len(), 1);
        let er = &v.markers[0];
        assert_eq!(er.percent, Some(90));
        assert_eq!(er.intensity, Some(Intensity::Strong));
        assert_eq!(er.evidence.len(), 2);
        assert!((er.confidence - 0.80).abs() < f32::EPSILON);
        assert!(v.report.errors.is_empty());
    }

    #[test]
    fn negative_with_percent_contradicts() {
        let mut c = cand("PR", Some(MarkerResult::Negative));
        c.percent = Some(40);
        let v = run(vec![c], &ctx(false));
        assert!(codes_of(&v.report.errors).contains(&codes::CONTRADICTORY_RESULT_PERCENT));
    }

    #[test]
    fn negative_with_strong_intensity_contradicts() {
        let mut strong = cand("ER", Some(MarkerResult::Negative));
        strong.intensity = Some(Intensity::Strong);
        let v = run(vec![strong], &ctx(false));
        assert_eq!(codes_of(&v.report.errors), vec![codes::CONTRADICTORY_ATTRIBUTE]);

        let mut weak = cand("HER2", Some(MarkerResult::Negative));
        weak.intensity = Some(Intensity::Weak);
        let v = run(vec![weak], &ctx(false));
        assert!(v.report.errors.is_empty(), "{:?}", v.report.errors);
    }

    #[test]
    fn negative_below_one_percent_is_consistent() {
        let mut c = cand("ER", Some(MarkerResult::Negative));
        c.percent = Some(1);
        c.percent_bound = Some(PercentBound::Below);
        let v = run(vec![c], &ctx(true));
        assert!(v.report.errors.is_empty(), "{:?}", v.report.errors);
        assert!(v.report.warnings.is_empty(), "{:?}", v.report.warnings);
    }

    #[test]
    fn percent_bound_is_approximate() {
        let mut c = cand("ER", Some(MarkerResult::Positive));
        c.intensity = Some(Intensity::Strong);
        c.percent = Some(90);
        c.percent_bound = Some(PercentBound::Above);
        let v = run(vec![c], &ctx(true));
        assert!(v.report.errors.is_empty(), "{:?}", v.report.errors);
        assert_eq!(codes_of(&v.report.warnings), vec![codes::PERCENT_APPROXIMATE]);
        assert!(v.report.warnings[0].message.contains(">90%"));
    }

    #[test]
    fn truncated_input_is_a_case_level_error() {
        let mut c = cand("CK7", Some(MarkerResult::Positive));
        c.intensity = Some(Intensity::Strong);
        c.pattern = Some(StainPattern::Cytoplasmic);
        let v = run(
            vec![c],
            &ValidationContext { truncated_from: Some(23_112), ..ctx(false) },
        );
        let issue = v
            .report
            .errors
            .iter()
            .find(|e| e.code == codes::INPUT_TRUNCATED)
            .unwrap();
        assert!(issue.marker.is_none());
        assert!(issue.message.contains("23112"));
        assert!((v.markers[0].confidence - 0.95).abs() < f32::EPSILON);
    }

    #[test]
    fn self_correction_contradicts() {
        let mut c = cand("CK20", Some(MarkerResult::Positive));
        c.conflicting_results.push(MarkerResult::Negative);
        let v = run(vec![c], &ctx(false));
        assert!(codes_of(&v.report.errors).contains(&codes::CONTRADICTORY_RESULT));
    }

    #[test]
    fn required_fields_for_er() {
        let v = run(vec![cand("ER", Some(MarkerResult::Positive))], &ctx(false));
        let warnings = codes_of(&v.report.warnings);
        assert!(warnings.contains(&codes::INTENSITY_REQUIRED_MISSING));
        assert!(warnings.contains(&codes::PERCENT_REQUIRED_MISSING));
    }

    #[test]
    fn negative_er_needs_no_intensity() {
        let v = run(vec![cand("ER", Some(MarkerResult::Negative))], &ctx(false));
        assert!(v.report.warnings.is_empty(), "{:?}", v.report.warnings);
    }

    #[test]
    fn ki67_not_done_needs_no_percent() {
        let v = run(vec![cand("Ki-67", Some(MarkerResult::NotDone))], &ctx(true));
        assert!(v.report.errors.is_empty(), "{:?}", v.report.errors);
    }

    #[test]
    fn range_satisfies_percent_but_warns() {
        let mut c = cand("Ki-67", Some(MarkerResult::Positive));
        c.percent_range = Some(PercentRange { low: 10, high: 20 });
        let v = run(vec![c], &ctx(true));
        assert!(v.report.errors.is_empty(), "{:?}", v.report.errors);
        assert_eq!(codes_of(&v.report.warnings), vec![codes::PERCENT_APPROXIMATE]);
    }

    #[test]
    fn percent_out_of_range_is_error() {
        let mut c = cand("PR", Some(MarkerResult::Positive));
        c.percent = Some(150);
        c.intensity = Some(Intensity::Moderate);
        let v = run(vec![c], &ctx(false));
        assert_eq!(codes_of(&v.report.errors), vec![codes::PERCENT_OUT_OF_RANGE]);
        assert_eq!(v.markers[0].percent, Some(150));
    }

    #[test]
    fn hard_and_soft_pattern_rules() {
        let mut er = cand("ER", Some(MarkerResult::Negative));
        er.pattern = Some(StainPattern::Membranous);
        let mut ck7 = cand("CK7", Some(MarkerResult::Negative));
        ck7.pattern = Some(StainPattern::Nuclear);
        let v = run(vec![er, ck7], &ctx(false));
        assert_eq!(codes_of(&v.report.errors), vec![codes::INVALID_PATTERN]);
        assert_eq!(codes_of(&v.report.warnings), vec![codes::UNUSUAL_PATTERN]);
    }

    #[test]
    fn unknown_marker_is_warning_with_suggestion() {
        let mut c = MarkerCandidate::new("GATA2", false, 0.50);
        c.result = Some(MarkerResult::Positive);
        c.result_source = ResultSource::Explicit;
        let v = run(vec![c], &ctx(false));
        let unknown = v
            .report
            .warnings
            .iter()
            .find(|w| w.code == codes::UNKNOWN_MARKER)
            .unwrap();
        assert!(unknown.message.contains("GATA3"));
        // Only unknown markers: the case has nothing usable.
        assert_eq!(codes_of(&v.report.errors), vec![codes::NO_MARKERS_FOUND]);
        assert_eq!(v.usable_count(), 0);
    }

    #[test]
    fn no_markers_is_case_level_error() {
        let v = run(Vec::new(), &ctx(false));
        assert_eq!(v.report.errors.len(), 1);
        assert_eq!(v.report.errors[0].kind, IssueKind::MissingField);
        assert!(v.report.errors[0].marker.is_none());
    }

    #[test]
    fn diagnostic_leak_warning_then_error_under_strict() {
        let text = "TTF-1 positive, favour lung primary";
        let mut c = cand("TTF-1", Some(MarkerResult::Positive));
        c.intensity = Some(Intensity::Strong);
        let lenient = run(
            vec![c.clone()],
            &ValidationContext { text, ..ctx(false) },
        );
        assert_eq!(codes_of(&lenient.report.warnings), vec![codes::DIAGNOSTIC_LANGUAGE_DETECTED]);
        assert!((lenient.markers[0].confidence - 0.95).abs() < f32::EPSILON);

        let strict = run(vec![c], &ValidationContext { text, ..ctx(true) });
        assert_eq!(codes_of(&strict.report.errors), vec![codes::DIAGNOSTIC_LANGUAGE_DETECTED]);
    }

    #[test]
    fn panel_markers_missing() {
        let mut er = cand("ER", Some(MarkerResult::Negative));
        er.evidence.clear();
        let v = run(
            vec![er],
            &ValidationContext { panel_hint: Some("Breast"), ..ctx(false) },
        );
        let missing: Vec<_> = v
            .report
            .warnings
            .iter()
            .filter(|w| w.code == codes::PANEL_MARKER_MISSING)
            .filter_map(|w| w.marker.as_deref())
            .collect();
        assert_eq!(missing, vec!["PR", "HER2", "Ki-67"]);
    }

    #[test]
    fn inferred_result_still_reported_missing() {
        let mut c = cand("CK7", Some(MarkerResult::Positive));
        c.result_source = ResultSource::Inferred;
        c.intensity = Some(Intensity::Weak);
        let v = run(vec![c], &ctx(false));
        assert_eq!(codes_of(&v.report.warnings), vec![codes::RESULT_MISSING]);
    }

    #[test]
    fn hedged_marker_warns() {
        let mut c = cand("CK20", Some(MarkerResult::Negative));
        c.hedged = true;
        let v = run(vec![c], &ctx(false));
        assert_eq!(codes_of(&v.report.warnings), vec![codes::LOW_CONFIDENCE]);
        assert!(v.markers[0].confidence < 0.95);
    }
}
