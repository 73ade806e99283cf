use std::sync::LazyLock;

use regex::Regex;

use super::types::{LeakCategory, LeakFinding};

/// A compiled pattern with its finding metadata.
struct LeakPattern {
    regex: Regex,
    category: LeakCategory,
    description: &'static str,
}

/// Conclusion phrases: the dictating pathologist interpreting, not observing.
static CONCLUSION_PATTERNS: LazyLock<Vec<LeakPattern>> = LazyLock::new(|| {
    vec![
        pattern(
            r"(?i)\bfavou?r(?:s|ed|ing)?\b",
            LeakCategory::ConclusionPhrase,
            "Conclusion: 'favour'",
        ),
        pattern(
            r"(?i)\bconsistent\s+with\b",
            LeakCategory::ConclusionPhrase,
            "Conclusion: 'consistent with'",
        ),
        pattern(
            r"(?i)\bsuggestive\s+of\b",
            LeakCategory::ConclusionPhrase,
            "Conclusion: 'suggestive of'",
        ),
        pattern(
            r"(?i)\bin\s+keeping\s+with\b",
            LeakCategory::ConclusionPhrase,
            "Conclusion: 'in keeping with'",
        ),
        pattern(
            r"(?i)\bcompatible\s+with\b",
            LeakCategory::ConclusionPhrase,
            "Conclusion: 'compatible with'",
        ),
        pattern(
            r"(?i)\bsupport(?:s|ed|ing)?\s+(?:an?\s+|the\s+)?(?:diagnosis|interpretation|impression)\b",
            LeakCategory::ConclusionPhrase,
            "Conclusion: 'supports'",
        ),
        pattern(
            r"(?i)\bdiagnos(?:is|tic)\s+(?:of|is)\b",
            LeakCategory::ConclusionPhrase,
            "Conclusion: 'diagnosis of'",
        ),
    ]
});

/// Named tumour entities.
static ENTITY_PATTERNS: LazyLock<Vec<LeakPattern>> = LazyLock::new(|| {
    vec![
        pattern(
            r"(?i)\b(?:(?:squamous|small|large|clear|urothelial|ductal|lobular|hepatocellular|renal|basal)\s+(?:cell\s+)?)?(?:adeno)?carcinomas?\b",
            LeakCategory::TumourEntity,
            "Entity: carcinoma",
        ),
        pattern(
            r"(?i)\b(?:lymphomas?|melanomas?|sarcomas?|mesotheliomas?|seminomas?|gliomas?|myelomas?)\b",
            LeakCategory::TumourEntity,
            "Entity: named neoplasm",
        ),
        pattern(
            r"(?i)\bneuroendocrine\s+(?:tumou?rs?|neoplasms?|carcinomas?)\b",
            LeakCategory::TumourEntity,
            "Entity: neuroendocrine neoplasm",
        ),
        pattern(
            r"(?i)\bmalignan(?:t|cy|cies)\b",
            LeakCategory::TumourEntity,
            "Entity: malignancy",
        ),
    ]
});

/// Site-of-origin statements.
static ORIGIN_PATTERNS: LazyLock<Vec<LeakPattern>> = LazyLock::new(|| {
    vec![
        pattern(
            r"(?i)\bmetasta(?:sis|ses|tic|sized|sised)\b",
            LeakCategory::OriginStatement,
            "Origin: metastasis",
        ),
        pattern(
            r"(?i)\b(?:lung|pulmonary|breast|colorectal|colonic|gastric|pancreatic|ovarian|endometrial|renal|thyroid|prostat(?:e|ic)|urothelial|bladder|hepatic|unknown)\s+primary\b|\bprimary\s+(?:tumou?r|site|neoplasm|malignancy|lesion)\s+(?:of|in|is)\b",
            LeakCategory::OriginStatement,
            "Origin: primary site",
        ),
        pattern(
            r"(?i)\b(?:of|from)\s+[a-z]+\s+origin\b",
            LeakCategory::OriginStatement,
            "Origin: 'of ... origin'",
        ),
    ]
});

fn pattern(regex_str: &str, category: LeakCategory, description: &'static str) -> LeakPattern {
    LeakPattern {
        regex: Regex::new(regex_str).expect("Invalid diagnostic-language regex pattern"),
        category,
        description,
    }
}

/// Scan transcript text for diagnostic conclusions.
pub fn scan_diagnostic_language(text: &str) -> Vec<LeakFinding> {
    let mut findings = Vec::new();

    for patterns in [&*CONCLUSION_PATTERNS, &*ENTITY_PATTERNS, &*ORIGIN_PATTERNS] {
        for lp in patterns {
            for mat in lp.regex.find_iter(text) {
                findings.push(LeakFinding {
                    category: lp.category,
                    matched_text: mat.as_str().to_string(),
                    offset: mat.start(),
                    length: mat.len(),
                    reason: lp.description.to_string(),
                });
            }
        }
    }

    deduplicate_findings(&mut findings);

    findings
}

/// Remove overlapping findings, keeping the more specific (longer) match.
pub fn deduplicate_findings(findings: &mut Vec<LeakFinding>) {
    findings.sort_by_key(|f| (f.offset, std::cmp::Reverse(f.length)));
    let mut i = 0;
    while i < findings.len() {
        let end_i = findings[i].offset + findings[i].length;
        let mut j = i + 1;
        while j < findings.len() {
            let end_j = findings[j].offset + findings[j].length;
            if findings[j].offset >= findings[i].offset && end_j <= end_i {
                findings.remove(j);
            } else {
                j += 1;
            }
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observational_text_is_clean() {
        let text = "ER positive, strong nuclear staining in 90% of tumour cells. HER2 negative.";
        assert!(scan_diagnostic_language(text).is_empty());
    }

    #[test]
    fn conclusion_phrase_detected() {
        let findings = scan_diagnostic_language("Features are consistent with a metastasis of breast origin.");
        assert!(findings.iter().any(|f| f.category == LeakCategory::ConclusionPhrase));
        assert!(findings.iter().any(|f| f.category == LeakCategory::OriginStatement));
    }

    #[test]
    fn favour_spellings() {
        for text in ["Favour lung primary", "favor adenocarcinoma", "Favouring melanoma"] {
            let findings = scan_diagnostic_language(text);
            assert!(
                findings.iter().any(|f| f.category == LeakCategory::ConclusionPhrase),
                "missed conclusion in {text:?}"
            );
        }
    }

    #[test]
    fn support_and_primary_need_conclusion_form() {
        for text in [
            "Supporting stroma is negative for CK7.",
            "Primary antibody omitted on the negative control slide.",
            "Staining supported by external controls.",
        ] {
            assert!(scan_diagnostic_language(text).is_empty(), "false positive in {text:?}");
        }
        for text in [
            "This supports a diagnosis of adenoma.",
            "Profile favours a lung primary.",
            "Primary tumour of the colon is likely.",
        ] {
            assert!(!scan_diagnostic_language(text).is_empty(), "missed leak in {text:?}");
        }
    }

    #[test]
    fn entity_longest_match_kept() {
        let findings = scan_diagnostic_language("Squamous cell carcinoma.");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].matched_text, "Squamous cell carcinoma");
        assert_eq!(findings[0].offset, 0);
    }

    #[test]
    fn metastatic_detected() {
        let findings = scan_diagnostic_language("Picture suggests metastatic disease");
        assert!(findings.iter().any(|f| f.matched_text.eq_ignore_ascii_case("metastatic")));
    }

    #[test]
    fn nested_matches_deduplicated() {
        let findings = scan_diagnostic_language("neuroendocrine carcinoma");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].length, "neuroendocrine carcinoma".len());
    }

    #[test]
    fn findings_sorted_by_offset() {
        let findings = scan_diagnostic_language("Malignant. Consistent with lymphoma.");
        let offsets: Vec<usize> = findings.iter().map(|f| f.offset).collect();
        let mut sorted = offsets.clone();
        sorted.sort_unstable();
        assert_eq!(offsets, sorted);
        assert_eq!(findings.len(), 3);
    }
}
