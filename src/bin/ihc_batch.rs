use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use ihc_structuring_lib::batch::{self, BatchOptions};
use ihc_structuring_lib::engine_config::EngineConfig;
use ihc_structuring_lib::pipeline::structuring::{IhcEngine, MarkerVocabulary};

#[derive(Parser, Debug)]
#[command(about = "Structure dictated IHC transcripts into validated marker results", version)]
#[command(group(ArgGroup::new("input").required(true).args(["batch", "cases"])))]
struct Args {
    /// Plain-text batch, one case per blank-line separated paragraph.
    #[arg(long = "batch", value_name = "FILE")]
    batch: Option<PathBuf>,

    /// JSON array of cases.
    #[arg(long = "cases", value_name = "FILE")]
    cases: Option<PathBuf>,

    /// Output JSON file; stdout when omitted.
    #[arg(long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Specimen label for cases built from a text batch.
    #[arg(long = "specimen")]
    specimen: Option<String>,

    #[arg(long = "marker-dict", value_name = "FILE", env = "IHC_MARKER_DICT")]
    marker_dict: Option<PathBuf>,

    /// Engine tunables (qualifier window, confidences, penalties).
    #[arg(long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long = "strict", overrides_with = "no_strict")]
    strict: bool,

    /// Report missing fields as warnings instead of errors.
    #[arg(long = "no-strict", overrides_with = "strict")]
    no_strict: bool,

    #[arg(long = "allow-inference")]
    allow_inference: bool,
}

fn main() -> Result<()> {
    ihc_structuring_lib::init_tracing();
    let args = Args::parse();

    let vocabulary = match &args.marker_dict {
        Some(path) => MarkerVocabulary::from_json_path(path)
            .with_context(|| format!("Failed to load marker dictionary {}", path.display()))?,
        None => MarkerVocabulary::builtin().context("Failed to build built-in vocabulary")?,
    };
    let config = match &args.config {
        Some(path) => EngineConfig::from_json_path(path)
            .with_context(|| format!("Failed to load engine config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let engine = IhcEngine::new(vocabulary, config).context("Failed to build IHC engine")?;

    let cases = if let Some(path) = &args.cases {
        batch::load_cases(path)
            .with_context(|| format!("Failed to read cases {}", path.display()))?
    } else if let Some(path) = &args.batch {
        let text = batch::read_batch_text(path)
            .with_context(|| format!("Failed to read batch {}", path.display()))?;
        let opts = BatchOptions {
            specimen: args.specimen.clone(),
            strict: args.strict || !args.no_strict,
            allow_inference: args.allow_inference,
            ..BatchOptions::default()
        };
        batch::build_cases(&text, &opts)
    } else {
        anyhow::bail!("either --batch or --cases is required");
    };

    let report = batch::run_cases(&engine, &cases);

    match &args.output {
        Some(path) => batch::write_report(&report, path)
            .with_context(|| format!("Failed to write output {}", path.display()))?,
        None => {
            let json = serde_json::to_string_pretty(&report).context("Failed to encode output")?;
            println!("{json}");
        }
    }

    Ok(())
}
