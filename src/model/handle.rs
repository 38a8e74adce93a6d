use crate::error::InferenceError;
use crate::model::manifest::ModelManifest;
use crate::preprocessing::StructuredInput;
use std::fmt;
use std::sync::Arc;

/// A loaded backend. Implementations are immutable after construction, or
/// serialize access internally, so a single instance can serve concurrent
/// requests.
pub trait Predictor: Send + Sync {
    /// Returns one prediction per input record, in input order.
    fn predict(&self, input: &StructuredInput) -> Result<Vec<Prediction>, InferenceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    /// Per-class probabilities aligned with [`PredictionResult::classes`].
    pub probabilities: Option<Vec<f64>>,
}

impl Prediction {
    /// Picks the most probable class. Ties go to the earlier class.
    pub fn from_probabilities(classes: &[String], probabilities: Vec<f64>) -> Self {
        let mut best = 0;
        for (index, &p) in probabilities.iter().enumerate() {
            if p > probabilities[best] {
                best = index;
            }
        }
        Self {
            label: classes.get(best).cloned().unwrap_or_default(),
            probabilities: Some(probabilities),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub classes: Arc<[String]>,
    pub predictions: Vec<Prediction>,
    /// The request carried a single record rather than a list.
    pub single: bool,
}

/// Shared, read-only reference to a loaded model.
///
/// Cloning is cheap and every clone points at the same predictor. Separate
/// calls to [`crate::model::loader::load`] produce unrelated handles.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<LoadedModel>,
}

struct LoadedModel {
    manifest: ModelManifest,
    classes: Arc<[String]>,
    predictor: Box<dyn Predictor>,
}

impl ModelHandle {
    pub fn new(manifest: ModelManifest, predictor: Box<dyn Predictor>) -> Self {
        let classes = Arc::from(manifest.classes.clone());
        Self {
            inner: Arc::new(LoadedModel {
                manifest,
                classes,
                predictor,
            }),
        }
    }

    pub fn manifest(&self) -> &ModelManifest {
        &self.inner.manifest
    }

    /// Checks `input` against the feature schema without running the model.
    pub fn validate(&self, input: &StructuredInput) -> Result<(), InferenceError> {
        self.inner.manifest.check_input(input)
    }

    pub fn predict(&self, input: &StructuredInput) -> Result<PredictionResult, InferenceError> {
        let predictions = self.inner.predictor.predict(input)?;
        if predictions.len() != input.len() {
            return Err(InferenceError::Prediction(format!(
                "backend returned {} predictions for {} records",
                predictions.len(),
                input.len()
            )));
        }

        Ok(PredictionResult {
            classes: Arc::clone(&self.inner.classes),
            predictions,
            single: input.is_single(),
        })
    }

    /// True when both handles share the same loaded predictor.
    pub fn ptr_eq(&self, other: &ModelHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("backend", &self.inner.manifest.backend.name())
            .field("label", &self.inner.manifest.label)
            .field("classes", &self.inner.classes)
            .finish()
    }
}
