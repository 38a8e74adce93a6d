//! Offline scoring over a processing directory:
//!
//! ```text
//! <base>/input/test/*.csv                  rows to score
//! <base>/input/model/                      model directory, or model.tar.gz
//! <base>/output/inference_result/result.json
//! ```

use crate::content_type::ContentType;
use crate::model::manifest::FeatureKind;
use crate::model::{self, LoadOptions, PredictionResult};
use crate::preprocessing::{self, Record, StructuredInput};
use anyhow::{bail, Context};
use flate2::read::GzDecoder;
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_BASE_DIR: &str = "/opt/ml/processing";
const MODEL_ARCHIVE: &str = "model.tar.gz";

#[derive(Debug, Clone)]
pub struct BatchPaths {
    pub input_dir: PathBuf,
    pub model_dir: PathBuf,
    pub output_file: PathBuf,
}

impl BatchPaths {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            input_dir: base_dir.join("input").join("test"),
            model_dir: base_dir.join("input").join("model"),
            output_file: base_dir
                .join("output")
                .join("inference_result")
                .join("result.json"),
        }
    }
}

/// Scores every CSV under `<base>/input/test` and writes `result.json`.
/// Returns the path written.
pub fn run(base_dir: &Path, options: &LoadOptions) -> anyhow::Result<PathBuf> {
    let paths = BatchPaths::new(base_dir);

    let files = list_csv_files(&paths.input_dir)?;
    info!(input_dir = %paths.input_dir.display(), files = ?files, "input file list");
    if files.is_empty() {
        bail!("No input files found in {}", paths.input_dir.display());
    }

    if !paths.model_dir.is_dir() {
        bail!("model directory {} does not exist", paths.model_dir.display());
    }
    if extract_archive(&paths.model_dir)? {
        info!(model_dir = %paths.model_dir.display(), "extracted {MODEL_ARCHIVE}");
    }

    info!("loading model");
    let handle = model::load_with(&paths.model_dir, options)
        .with_context(|| format!("failed to load model from {}", paths.model_dir.display()))?;
    let manifest = handle.manifest();

    let input_dir = fs::canonicalize(&paths.input_dir)
        .with_context(|| format!("cannot resolve {}", paths.input_dir.display()))?;
    let image_columns: Vec<&str> = manifest
        .features_of(FeatureKind::Image)
        .map(|f| f.name.as_str())
        .collect();

    let mut records = Vec::new();
    for file in &files {
        let raw = fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
        let input = preprocessing::decode_as(&raw, ContentType::Csv)
            .with_context(|| format!("cannot parse {}", file.display()))?;
        records.extend(input.into_records());
    }
    for record in &mut records {
        record.remove(&manifest.label);
        expand_image_columns(record, &image_columns, &input_dir);
    }
    info!(rows = records.len(), "loaded test data");

    let input = StructuredInput::batch(records)?;
    handle.validate(&input)?;
    let result = handle.predict(&input)?;
    for (index, prediction) in result.predictions.iter().take(5).enumerate() {
        info!(row = index, label = %prediction.label, probabilities = ?prediction.probabilities, "prediction");
    }

    info!(output = %paths.output_file.display(), "writing predictions");
    write_result(&paths.output_file, &result)?;
    Ok(paths.output_file)
}

fn list_csv_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("cannot list {}", dir.display()))? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    // Directory order is platform dependent; keep row order reproducible.
    files.sort();
    Ok(files)
}

/// Unpacks `model.tar.gz` in place when present.
fn extract_archive(model_dir: &Path) -> anyhow::Result<bool> {
    let archive = model_dir.join(MODEL_ARCHIVE);
    if !archive.is_file() {
        return Ok(false);
    }
    let file = File::open(&archive).with_context(|| format!("cannot open {}", archive.display()))?;
    tar::Archive::new(GzDecoder::new(file))
        .unpack(model_dir)
        .with_context(|| format!("cannot extract {}", archive.display()))?;
    Ok(true)
}

/// Image cells may list several `;`-separated paths; the first one is kept
/// and resolved against the input directory.
fn expand_image_columns(record: &mut Record, columns: &[&str], base: &Path) {
    for column in columns {
        if let Some(Value::String(cell)) = record.get_mut(*column) {
            *cell = expand_image_path(cell, base);
        }
    }
}

pub fn expand_image_path(cell: &str, base: &Path) -> String {
    let first = cell.split(';').next().unwrap_or_default().trim();
    base.join(first).display().to_string()
}

/// `{"0": label, "1": label, ...}` keyed by row position.
fn write_result(path: &Path, result: &PredictionResult) -> anyhow::Result<()> {
    let labels: Map<String, Value> = result
        .predictions
        .iter()
        .enumerate()
        .map(|(index, p)| (index.to_string(), Value::String(p.label.clone())))
        .collect();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("cannot create {}", parent.display()))?;
    }
    fs::write(path, serde_json::to_vec(&Value::Object(labels))?)
        .with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}
