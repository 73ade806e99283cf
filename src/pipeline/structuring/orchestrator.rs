use std::sync::LazyLock;

use uuid::Uuid;

use super::confidence::confidence_band;
use super::extract::MarkerExtractor;
use super::normalize::AliasNormalizer;
use super::render::render;
use super::sanitize::sanitize_transcript;
use super::status::resolve_status;
use super::types::{Case, CaseProcessor, IhcPanel, ProcessedCase, Provenance};
use super::validation::{validate_candidates, ValidationContext};
use super::vocabulary::MarkerVocabulary;
use super::IhcError;
use crate::config::{ENGINE_VERSION, EXTRACTION_MODEL};
use crate::engine_config::EngineConfig;

/// Namespace for deterministic output ids (UUID v5 of the input id).
const OUTPUT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1d_2c3a_8b4e_5a79_9c0d_e1f2_a3b4_c5d6);

/// Orchestrates the structuring pipeline for one case:
/// sanitize → normalize → extract → validate → status → render
///
/// Built once, then shared read-only; `process_case` takes `&self` and holds
/// no per-case state, so cases can run on any number of threads.
#[derive(Debug)]
pub struct IhcEngine {
    vocabulary: MarkerVocabulary,
    config: EngineConfig,
    normalizer: AliasNormalizer,
}

impl IhcEngine {
    pub fn new(vocabulary: MarkerVocabulary, config: EngineConfig) -> Result<Self, IhcError> {
        config.check()?;
        let normalizer = AliasNormalizer::new(&vocabulary)?;
        tracing::info!(
            vocabulary = %vocabulary.version(),
            markers = vocabulary.markers().len(),
            penalties = %config.penalties.version,
            "IHC engine ready"
        );
        Ok(Self {
            vocabulary,
            config,
            normalizer,
        })
    }

    /// Built-in vocabulary and default config.
    pub fn with_defaults() -> Result<Self, IhcError> {
        Self::new(MarkerVocabulary::builtin()?, EngineConfig::default())
    }
}

impl CaseProcessor for IhcEngine {
    fn process_case(&self, case: &Case) -> ProcessedCase {
        let _span = tracing::debug_span!("process_case", input_id = %case.input_id).entered();

        let sanitized = sanitize_transcript(&case.raw_text, &case.input_id);
        let normalized = self.normalizer.normalize(&sanitized.text);

        let candidates = MarkerExtractor::new(&self.vocabulary, &self.config)
            .extract(&normalized.text, case.options);

        let ctx = ValidationContext {
            input_id: &case.input_id,
            text: &normalized.text,
            options: case.options,
            panel_hint: case.context.panel_hint.as_deref(),
            truncated_from: sanitized.truncated_from,
        };
        let validated = validate_candidates(candidates, &ctx, &self.vocabulary, &self.config);

        let status = resolve_status(
            &validated.report.errors,
            &validated.report.warnings,
            case.options.strict_mode,
            validated.usable_count(),
        );
        let rendered = render(&validated.markers, case.context.specimen_id.as_deref());

        let lowest = validated
            .markers
            .iter()
            .map(|m| m.confidence)
            .fold(None, |acc: Option<f32>, c| Some(acc.map_or(c, |a| a.min(c))));
        tracing::debug!(
            input_id = %case.input_id,
            status = %status,
            markers = validated.markers.len(),
            aliases_rewritten = normalized.rewrites.len(),
            errors = validated.report.errors.len(),
            warnings = validated.report.warnings.len(),
            lowest_confidence = lowest.map(confidence_band).unwrap_or("none"),
            "Case processed"
        );

        ProcessedCase {
            output_id: output_id_for(&case.input_id),
            input_id: case.input_id.clone(),
            status,
            ihc: IhcPanel {
                panel_name: case.context.panel_hint.clone(),
                case_id: case.context.case_id.clone(),
                specimen_id: case.context.specimen_id.clone(),
                markers: validated.markers,
            },
            rendered,
            normalized,
            validation: validated.report,
            provenance: Provenance {
                source_type: case.input_type,
                extraction_model: EXTRACTION_MODEL.into(),
                version: ENGINE_VERSION.into(),
                vocabulary_version: self.vocabulary.version().to_string(),
                penalty_table_version: self.config.penalties.version.clone(),
                source: case.metadata.source.clone(),
                language: case.metadata.language.clone(),
                locale: case.metadata.locale.clone(),
            },
        }
    }
}

/// Deterministic output id for an input id.
pub fn output_id_for(input_id: &str) -> String {
    Uuid::new_v5(&OUTPUT_ID_NAMESPACE, input_id.as_bytes()).to_string()
}

static DEFAULT_ENGINE: LazyLock<IhcEngine> = LazyLock::new(|| {
    IhcEngine::with_defaults().expect("built-in vocabulary must compile")
});

/// Process one case with the built-in vocabulary and default config.
pub fn process_case(case: &Case) -> ProcessedCase {
    DEFAULT_ENGINE.process_case(case)
}
