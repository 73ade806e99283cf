use super::types::ValidationIssue;
use crate::models::enums::CaseStatus;

/// Combine validation findings into a case status.
///
/// - `failed`: no usable marker, or strict mode with any structural error
///   (missing field, contradiction, invalid pattern).
/// - `needs_review`: any remaining error or any warning.
/// - `ok`: nothing to report.
pub fn resolve_status(
    errors: &[ValidationIssue],
    warnings: &[ValidationIssue],
    strict_mode: bool,
    usable_markers: usize,
) -> CaseStatus {
    if usable_markers == 0 {
        return CaseStatus::Failed;
    }
    if strict_mode && errors.iter().any(|e| e.kind.is_structural()) {
        return CaseStatus::Failed;
    }
    if !errors.is_empty() || !warnings.is_empty() {
        return CaseStatus::NeedsReview;
    }
    CaseStatus::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{IssueKind, Severity};

    fn issue(kind: IssueKind, severity: Severity) -> ValidationIssue {
        ValidationIssue {
            kind,
            severity,
            code: "TEST".into(),
            marker: None,
            message: String::new(),
            evidence: None,
        }
    }

    #[test]
    fn zero_markers_fail() {
        assert_eq!(resolve_status(&[], &[], false, 0), CaseStatus::Failed);
    }

    #[test]
    fn clean_case_ok() {
        assert_eq!(resolve_status(&[], &[], true, 3), CaseStatus::Ok);
    }

    #[test]
    fn warning_needs_review() {
        let w = [issue(IssueKind::UnknownMarker, Severity::Warning)];
        assert_eq!(resolve_status(&[], &w, true, 1), CaseStatus::NeedsReview);
    }

    #[test]
    fn structural_error_fails_only_under_strict() {
        for kind in [IssueKind::MissingField, IssueKind::Contradiction, IssueKind::InvalidPattern] {
            let e = [issue(kind, Severity::Error)];
            assert_eq!(resolve_status(&e, &[], true, 1), CaseStatus::Failed, "{kind}");
            assert_eq!(resolve_status(&e, &[], false, 1), CaseStatus::NeedsReview, "{kind}");
        }
    }

    #[test]
    fn leak_error_under_strict_needs_review() {
        let e = [issue(IssueKind::DiagnosticLeak, Severity::Error)];
        assert_eq!(resolve_status(&e, &[], true, 2), CaseStatus::NeedsReview);
    }

    #[test]
    fn strict_never_lowers_status() {
        let e = [issue(IssueKind::Contradiction, Severity::Error)];
        let w = [issue(IssueKind::MissingField, Severity::Warning)];
        for (errors, warnings) in [(&e[..], &[][..]), (&[][..], &w[..]), (&[][..], &[][..])] {
            let lenient = resolve_status(errors, warnings, false, 1);
            let strict = resolve_status(errors, warnings, true, 1);
            assert!(strict.rank() >= lenient.rank());
        }
    }
}
