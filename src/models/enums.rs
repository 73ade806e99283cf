use crate::pipeline::structuring::IhcError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form doubles as the serde wire name.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = IhcError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(IhcError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(InputType {
    Text => "text",
    Asr => "asr",
});

str_enum!(MarkerResult {
    Positive => "positive",
    Negative => "negative",
    Equivocal => "equivocal",
    NotDone => "not-done",
});

str_enum!(StainPattern {
    Nuclear => "nuclear",
    Cytoplasmic => "cytoplasmic",
    Membranous => "membranous",
});

str_enum!(Intensity {
    Weak => "weak",
    Moderate => "moderate",
    Strong => "strong",
});

str_enum!(Extent {
    Focal => "focal",
    Diffuse => "diffuse",
});

// Comparator dictated before a percent ("<1%", "more than 90%").
str_enum!(PercentBound {
    Below => "below",
    Above => "above",
});

str_enum!(CaseStatus {
    Ok => "ok",
    NeedsReview => "needs_review",
    Failed => "failed",
});

str_enum!(IssueKind {
    Contradiction => "contradiction",
    MissingField => "missing_field",
    InvalidPattern => "invalid_pattern",
    UnknownMarker => "unknown_marker",
    DiagnosticLeak => "diagnostic_leak",
    UncertainValue => "uncertain_value",
});

str_enum!(Severity {
    Error => "error",
    Warning => "warning",
});

// Which extraction rule supplied a candidate's result.
str_enum!(ResultSource {
    Explicit => "explicit",
    LeadIn => "lead_in",
    SharedList => "shared_list",
    Inferred => "inferred",
    Absent => "absent",
});

str_enum!(Requirement {
    Never => "never",
    WhenPositive => "when_positive",
    UnlessNotDone => "unless_not_done",
});

impl MarkerResult {
    /// Label used in narrative text.
    pub fn display_label(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::Equivocal => "Equivocal",
            Self::NotDone => "Not done",
        }
    }
}

impl PercentBound {
    /// Prefix used when rendering the percent.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Below => "<",
            Self::Above => ">",
        }
    }
}

impl CaseStatus {
    /// Position in the strictness lattice: ok < needs_review < failed.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::NeedsReview => 1,
            Self::Failed => 2,
        }
    }
}

impl IssueKind {
    /// Structural kinds are the ones that can fail a case under strict mode.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MissingField | Self::Contradiction | Self::InvalidPattern
        )
    }
}

impl Requirement {
    /// Whether the field must be present for a marker with this result.
    pub fn applies_to(&self, result: Option<MarkerResult>) -> bool {
        match self {
            Self::Never => false,
            Self::WhenPositive => result == Some(MarkerResult::Positive),
            Self::UnlessNotDone => result != Some(MarkerResult::NotDone),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn marker_result_round_trips_through_str() {
        for r in [
            MarkerResult::Positive,
            MarkerResult::Negative,
            MarkerResult::Equivocal,
            MarkerResult::NotDone,
        ] {
            assert_eq!(MarkerResult::from_str(r.as_str()).unwrap(), r);
        }
    }

    #[test]
    fn unknown_value_is_rejected() {
        let err = StainPattern::from_str("granular").unwrap_err();
        assert!(err.to_string().contains("StainPattern"));
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&CaseStatus::NeedsReview).unwrap(),
            "\"needs_review\""
        );
        assert_eq!(
            serde_json::to_string(&MarkerResult::NotDone).unwrap(),
            "\"not-done\""
        );
        let kind: IssueKind = serde_json::from_str("\"diagnostic_leak\"").unwrap();
        assert_eq!(kind, IssueKind::DiagnosticLeak);
    }

    #[test]
    fn status_ranks_are_ordered() {
        assert!(CaseStatus::Ok.rank() < CaseStatus::NeedsReview.rank());
        assert!(CaseStatus::NeedsReview.rank() < CaseStatus::Failed.rank());
    }

    #[test]
    fn structural_kinds() {
        assert!(IssueKind::MissingField.is_structural());
        assert!(IssueKind::Contradiction.is_structural());
        assert!(IssueKind::InvalidPattern.is_structural());
        assert!(!IssueKind::UnknownMarker.is_structural());
        assert!(!IssueKind::DiagnosticLeak.is_structural());
        assert!(!IssueKind::UncertainValue.is_structural());
    }

    #[test]
    fn requirement_applicability() {
        assert!(!Requirement::Never.applies_to(Some(MarkerResult::Positive)));
        assert!(Requirement::WhenPositive.applies_to(Some(MarkerResult::Positive)));
        assert!(!Requirement::WhenPositive.applies_to(Some(MarkerResult::Negative)));
        assert!(Requirement::UnlessNotDone.applies_to(None));
        assert!(!Requirement::UnlessNotDone.applies_to(Some(MarkerResult::NotDone)));
    }
}
