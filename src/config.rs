/// Application-level constants
pub const APP_NAME: &str = "ihc-structuring";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Provenance: name of the extraction rule set.
pub const EXTRACTION_MODEL: &str = "rules-v1";

/// Provenance: version of the output contract.
pub const ENGINE_VERSION: &str = "ihc-mvp-1";

/// Specimen label used in narratives when the case context names none.
pub const DEFAULT_SPECIMEN_LABEL: &str = "Specimen A";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "ihc_structuring_lib=info,ihc_batch=info"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provenance_constants_are_fixed() {
        assert_eq!(EXTRACTION_MODEL, "rules-v1");
        assert_eq!(ENGINE_VERSION, "ihc-mvp-1");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn default_filter_targets_library() {
        assert!(default_log_filter().contains("ihc_structuring_lib"));
    }
}
