use crate::config::ModelConfig;
use crate::error::ModelLoadError;
use crate::model::handle::{ModelHandle, Predictor};
use crate::model::linear::LinearPredictor;
use crate::model::manifest::{BackendConfig, ModelManifest, MANIFEST_FILE};
use crate::model::onnx::OnnxPredictor;
use crate::observability::MODEL_LOAD_SECONDS;
use metrics::histogram;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Subdirectory some packaging layouts nest the artifact under.
const NESTED_MODEL_DIR: &str = "model";

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Intra-op threads for the ONNX backend.
    pub intra_threads: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { intra_threads: 4 }
    }
}

impl From<&ModelConfig> for LoadOptions {
    fn from(config: &ModelConfig) -> Self {
        Self {
            intra_threads: config.intra_threads,
        }
    }
}

/// Loads a previously saved predictor from disk.
///
/// # Arguments
/// * `model_dir` - directory holding `predictor.json`, directly or under `model/`
pub fn load(model_dir: impl AsRef<Path>) -> Result<ModelHandle, ModelLoadError> {
    load_with(model_dir, &LoadOptions::default())
}

pub fn load_with(
    model_dir: impl AsRef<Path>,
    options: &LoadOptions,
) -> Result<ModelHandle, ModelLoadError> {
    let start = Instant::now();
    let dir = model_dir.as_ref();
    if !dir.is_dir() {
        return Err(ModelLoadError::NotFound(dir.to_path_buf()));
    }

    let root = locate_artifact(dir)?;
    let manifest = ModelManifest::read(&root)?;

    let predictor: Box<dyn Predictor> = match &manifest.backend {
        BackendConfig::Linear { weights } => {
            Box::new(LinearPredictor::open(&root, weights, &manifest)?)
        }
        BackendConfig::Onnx {
            graph,
            output_index,
        } => Box::new(OnnxPredictor::open(
            &root,
            graph,
            *output_index,
            &manifest,
            options.intra_threads,
        )?),
    };

    let elapsed = start.elapsed();
    histogram!(MODEL_LOAD_SECONDS).record(elapsed.as_secs_f64());
    info!(
        path = %root.display(),
        backend = manifest.backend.name(),
        label = %manifest.label,
        classes = manifest.classes.len(),
        features = manifest.features.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "model loaded"
    );

    Ok(ModelHandle::new(manifest, predictor))
}

fn locate_artifact(dir: &Path) -> Result<PathBuf, ModelLoadError> {
    if dir.join(MANIFEST_FILE).is_file() {
        return Ok(dir.to_path_buf());
    }
    let nested = dir.join(NESTED_MODEL_DIR);
    if nested.join(MANIFEST_FILE).is_file() {
        return Ok(nested);
    }
    Err(ModelLoadError::NotFound(dir.join(MANIFEST_FILE)))
}
