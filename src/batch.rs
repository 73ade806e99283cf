//! Batch runner: split a dictated batch into cases, process each case and
//! write the results as one JSON artifact.
//!
//! A batch is either plain text (cases separated by blank lines) or a JSON
//! array of fully specified cases.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::enums::{CaseStatus, InputType};
use crate::pipeline::structuring::{
    segment_batch, Case, CaseContext, CaseMetadata, CaseOptions, CaseProcessor, IhcError,
    ProcessedCase,
};

/// Options applied to every case built from a plain-text batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub specimen: Option<String>,
    pub strict: bool,
    pub allow_inference: bool,
    pub input_type: InputType,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            specimen: None,
            strict: true,
            allow_inference: false,
            input_type: InputType::Asr,
        }
    }
}

/// Case counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub ok: usize,
    pub needs_review: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[ProcessedCase]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for r in results {
            match r.status {
                CaseStatus::Ok => summary.ok += 1,
                CaseStatus::NeedsReview => summary.needs_review += 1,
                CaseStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

/// The written artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub summary: BatchSummary,
    pub results: Vec<ProcessedCase>,
}

/// One case per paragraph, ids `case-01`, `case-02`, ...
pub fn build_cases(text: &str, opts: &BatchOptions) -> Vec<Case> {
    segment_batch(text)
        .into_iter()
        .enumerate()
        .map(|(i, raw_text)| Case {
            input_id: format!("case-{:02}", i + 1),
            input_type: opts.input_type,
            raw_text,
            context: CaseContext {
                case_id: None,
                specimen_id: opts.specimen.clone(),
                panel_hint: None,
            },
            options: CaseOptions {
                strict_mode: opts.strict,
                allow_inference: opts.allow_inference,
            },
            metadata: CaseMetadata::default(),
        })
        .collect()
}

pub fn read_batch_text(path: &Path) -> Result<String, IhcError> {
    Ok(std::fs::read_to_string(path)?)
}

/// Load a JSON array of cases.
pub fn load_cases(path: &Path) -> Result<Vec<Case>, IhcError> {
    let raw = std::fs::read_to_string(path)?;
    let cases: Vec<Case> = serde_json::from_str(&raw)?;
    tracing::info!(path = %path.display(), cases = cases.len(), "Cases loaded");
    Ok(cases)
}

/// Process every case in order.
pub fn run_cases(processor: &dyn CaseProcessor, cases: &[Case]) -> BatchReport {
    tracing::info!(cases = cases.len(), "Batch started");

    let results: Vec<ProcessedCase> = cases.iter().map(|c| processor.process_case(c)).collect();
    let summary = BatchSummary::from_results(&results);

    tracing::info!(
        total = summary.total,
        ok = summary.ok,
        needs_review = summary.needs_review,
        failed = summary.failed,
        "Batch finished"
    );
    BatchReport { summary, results }
}

/// Write the report as pretty JSON, creating parent directories.
pub fn write_report(report: &BatchReport, path: &Path) -> Result<(), IhcError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), "Batch output written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::IhcEngine;

    const BATCH: &str = "TTF one positive, strong, diffuse\n\n\
                         ER positive... ER negative\n   \n\
                         Sections show invasive ductal carcinoma, grade 2.\n";

    #[test]
    fn build_cases_numbers_and_applies_options() {
        let opts = BatchOptions {
            specimen: Some("A1".into()),
            ..BatchOptions::default()
        };
        let cases = build_cases(BATCH, &opts);
        let ids: Vec<&str> = cases.iter().map(|c| c.input_id.as_str()).collect();
        assert_eq!(ids, vec!["case-01", "case-02", "case-03"]);
        assert!(cases.iter().all(|c| c.options.strict_mode));
        assert!(cases.iter().all(|c| c.input_type == InputType::Asr));
        assert_eq!(cases[0].context.specimen_id.as_deref(), Some("A1"));
        assert_eq!(cases[0].raw_text, "TTF one positive, strong, diffuse");
    }

    #[test]
    fn empty_batch_builds_nothing() {
        assert!(build_cases("\n \n\t\n", &BatchOptions::default()).is_empty());
    }

    #[test]
    fn run_counts_statuses() {
        let engine = IhcEngine::with_defaults().unwrap();
        let opts = BatchOptions {
            strict: false,
            ..BatchOptions::default()
        };
        let report = run_cases(&engine, &build_cases(BATCH, &opts));
        assert_eq!(
            report.summary,
            BatchSummary {
                total: 3,
                ok: 1,
                needs_review: 1,
                failed: 1,
            }
        );
    }

    #[test]
    fn report_written_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("batch.txt");
        std::fs::write(&input, BATCH).unwrap();

        let engine = IhcEngine::with_defaults().unwrap();
        let text = read_batch_text(&input).unwrap();
        let report = run_cases(&engine, &build_cases(&text, &BatchOptions::default()));

        let output = dir.path().join("out").join("results.json");
        write_report(&report, &output).unwrap();

        let raw = std::fs::read_to_string(&output).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["summary"]["total"], 3);
        assert_eq!(value["results"][0]["status"], "ok");
        assert_eq!(value["results"][0]["ihc"]["markers"][0]["marker"], "TTF-1");

        let back: BatchReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.summary, report.summary);
    }

    #[test]
    fn load_json_cases_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.json");
        std::fs::write(
            &path,
            r#"[
                {"input_id": "S1", "raw_text": "CK7 positive, strong"},
                {"input_id": "S2", "input_type": "asr", "raw_text": "ER positive 90%",
                 "context": {"panel_hint": "breast"},
                 "options": {"strict_mode": true}}
            ]"#,
        )
        .unwrap();

        let cases = load_cases(&path).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].input_type, InputType::Text);
        assert!(!cases[0].options.strict_mode);
        assert_eq!(cases[1].context.panel_hint.as_deref(), Some("breast"));
        assert!(cases[1].options.strict_mode);
    }

    #[test]
    fn malformed_cases_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_cases(&path), Err(IhcError::Json(_))));
        assert!(matches!(
            load_cases(&dir.path().join("missing.json")),
            Err(IhcError::Io(_))
        ));
    }
}
