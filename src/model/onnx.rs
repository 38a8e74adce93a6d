use crate::error::{InferenceError, ModelLoadError};
use crate::model::handle::{Prediction, Predictor};
use crate::model::manifest::{FeatureKind, ModelManifest};
use crate::preprocessing::{numeric_value, StructuredInput};
use ndarray::{Array2, ArrayViewD, Ix2};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

// Initialize the global environment for ORT (only needed once)
pub fn init_ort() -> Result<(), ModelLoadError> {
    ort::init().with_name("tabserve").commit()?;
    Ok(())
}

/// ONNX graph taking one `[batch, n_features]` f32 tensor and producing
/// `[batch, n_classes]` probabilities.
///
/// `Session::run` needs exclusive access, so runs are serialized through a
/// mutex: concurrent requests queue on this one execution slot.
pub struct OnnxPredictor {
    session: Mutex<Session>,
    input_name: String,
    output_index: usize,
    columns: Vec<String>,
    classes: Vec<String>,
}

impl OnnxPredictor {
    /// Opens `file` inside `dir` as an inference session.
    ///
    /// # Arguments
    /// * `output_index` - which graph output holds the class probabilities
    /// * `intra_threads` - parallelism within an op
    pub fn open(
        dir: &Path,
        file: &str,
        output_index: usize,
        manifest: &ModelManifest,
        intra_threads: usize,
    ) -> Result<Self, ModelLoadError> {
        let path = dir.join(file);
        let corrupt = |reason: String| ModelLoadError::Corrupt {
            path: path.clone(),
            reason,
        };

        if let Some(feature) = manifest
            .features
            .iter()
            .find(|f| f.kind != FeatureKind::Numeric)
        {
            return Err(corrupt(format!(
                "onnx backend only accepts numeric features, `{}` is {:?}",
                feature.name, feature.kind
            )));
        }
        if !path.exists() {
            return Err(ModelLoadError::NotFound(path.clone()));
        }

        let session = Session::builder()
            .map_err(backend)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(backend)?
            .with_intra_threads(intra_threads) // Parallelism within an op
            .map_err(backend)?
            .commit_from_file(&path)
            .map_err(backend)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| corrupt("graph declares no inputs".to_string()))?;
        if output_index >= session.outputs.len() {
            return Err(corrupt(format!(
                "output index {output_index} out of range, graph has {} outputs",
                session.outputs.len()
            )));
        }

        info!(path = %path.display(), input = %input_name, "loaded onnx graph");
        for (i, input) in session.inputs.iter().enumerate() {
            info!("  input {}: {} ({:?})", i, input.name, input.input_type);
        }

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_index,
            columns: manifest.features.iter().map(|f| f.name.clone()).collect(),
            classes: manifest.classes.clone(),
        })
    }

    /// Missing optional features become NaN, the conventional "missing" marker
    /// for exported tree ensembles.
    fn feature_matrix(&self, input: &StructuredInput) -> Array2<f32> {
        let mut features = Array2::<f32>::from_elem((input.len(), self.columns.len()), f32::NAN);
        for (row, record) in input.records().iter().enumerate() {
            for (col, name) in self.columns.iter().enumerate() {
                if let Some(x) = record.get(name).and_then(numeric_value) {
                    features[[row, col]] = x as f32;
                }
            }
        }
        features
    }
}

fn backend(e: impl Into<ort::Error>) -> ModelLoadError {
    ModelLoadError::Backend(e.into())
}

fn prediction_error(e: impl std::fmt::Display) -> InferenceError {
    InferenceError::Prediction(e.to_string())
}

impl Predictor for OnnxPredictor {
    fn predict(&self, input: &StructuredInput) -> Result<Vec<Prediction>, InferenceError> {
        let features = self.feature_matrix(input);
        let shape = features.shape().to_vec();
        let (data, _) = features.into_raw_vec_and_offset();
        let input_value = Value::from_array((shape, data.into_boxed_slice())).map_err(prediction_error)?;

        let mut session_guard = self
            .session
            .lock()
            .map_err(|_| InferenceError::Prediction("onnx session lock poisoned".to_string()))?;
        let outputs = session_guard
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(prediction_error)?;

        let (shape, data) = outputs[self.output_index]
            .try_extract_tensor::<f32>()
            .map_err(prediction_error)?;
        let dims: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
        let output = ArrayViewD::from_shape(dims.as_slice(), data)
            .map_err(prediction_error)?
            .into_dimensionality::<Ix2>()
            .map_err(|_| prediction_error(format!("expected a 2-d probability tensor, got shape {dims:?}")))?;

        if output.nrows() != input.len() || output.ncols() != self.classes.len() {
            return Err(prediction_error(format!(
                "output shape {:?} does not match {} records x {} classes",
                output.shape(),
                input.len(),
                self.classes.len()
            )));
        }

        let predictions = output
            .rows()
            .into_iter()
            .map(|row| {
                let probabilities = row.iter().map(|&p| f64::from(p)).collect();
                Prediction::from_probabilities(&self.classes, probabilities)
            })
            .collect();
        Ok(predictions)
    }
}
