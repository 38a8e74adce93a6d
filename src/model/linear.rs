use crate::error::{InferenceError, ModelLoadError};
use crate::model::handle::{Prediction, Predictor};
use crate::model::manifest::{FeatureKind, FeatureSpec, ModelManifest};
use crate::preprocessing::{numeric_value, text_value, Record, StructuredInput};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Weights of a multinomial linear classifier.
///
/// `token_weights` covers lowercase alphanumeric tokens of text features and
/// `name=value` tokens of categorical features. Every vector has one entry per
/// class.
#[derive(Debug, Deserialize)]
struct LinearWeights {
    bias: Vec<f64>,
    #[serde(default)]
    token_weights: HashMap<String, Vec<f64>>,
    #[serde(default)]
    numeric_weights: HashMap<String, Vec<f64>>,
}

/// Lock-free backend: scoring only reads the weights.
#[derive(Debug)]
pub struct LinearPredictor {
    classes: Vec<String>,
    features: Vec<FeatureSpec>,
    weights: LinearWeights,
}

impl LinearPredictor {
    pub fn open(dir: &Path, file: &str, manifest: &ModelManifest) -> Result<Self, ModelLoadError> {
        let path = dir.join(file);
        let corrupt = |reason: String| ModelLoadError::Corrupt {
            path: path.clone(),
            reason,
        };

        let raw = fs::read(&path).map_err(|e| corrupt(format!("cannot read weights: {e}")))?;
        let weights: LinearWeights =
            serde_json::from_slice(&raw).map_err(|e| corrupt(e.to_string()))?;

        let width = manifest.classes.len();
        if weights.bias.len() != width {
            return Err(corrupt(format!(
                "bias has {} entries for {width} classes",
                weights.bias.len()
            )));
        }
        let vectors = weights
            .token_weights
            .iter()
            .chain(weights.numeric_weights.iter());
        for (key, vector) in vectors {
            if vector.len() != width {
                return Err(corrupt(format!(
                    "weights for `{key}` have {} entries for {width} classes",
                    vector.len()
                )));
            }
        }

        Ok(Self {
            classes: manifest.classes.clone(),
            features: manifest.features.clone(),
            weights,
        })
    }

    fn scores(&self, record: &Record) -> Vec<f64> {
        let mut scores = self.weights.bias.clone();
        let mut add = |vector: &[f64], scale: f64| {
            for (score, weight) in scores.iter_mut().zip(vector) {
                *score += weight * scale;
            }
        };

        for feature in &self.features {
            let Some(value) = record.get(&feature.name) else {
                continue;
            };
            match feature.kind {
                FeatureKind::Numeric => {
                    if let (Some(x), Some(vector)) = (
                        numeric_value(value),
                        self.weights.numeric_weights.get(&feature.name),
                    ) {
                        add(vector.as_slice(), x);
                    }
                }
                FeatureKind::Categorical => {
                    if let Some(text) = text_value(value) {
                        let token = format!("{}={}", feature.name, text);
                        if let Some(vector) = self.weights.token_weights.get(&token) {
                            add(vector.as_slice(), 1.0);
                        }
                    }
                }
                FeatureKind::Text => {
                    if let Some(text) = text_value(value) {
                        for token in tokenize(&text) {
                            if let Some(vector) = self.weights.token_weights.get(&token) {
                                add(vector.as_slice(), 1.0);
                            }
                        }
                    }
                }
                // Images carry no signal for a linear model.
                FeatureKind::Image => {}
            }
        }
        scores
    }
}

impl Predictor for LinearPredictor {
    fn predict(&self, input: &StructuredInput) -> Result<Vec<Prediction>, InferenceError> {
        input
            .records()
            .iter()
            .map(|record| {
                let scores = self.scores(record);
                // inf - inf from opposing overflowed terms has no winner.
                if scores.iter().any(|s| s.is_nan()) {
                    return Err(InferenceError::Prediction(format!(
                        "class scores are undefined: {scores:?}"
                    )));
                }
                Ok(Prediction::from_probabilities(&self.classes, softmax(&scores)))
            })
            .collect()
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

/// Scores overflowing to an infinite maximum share the whole mass evenly.
fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max.is_infinite() {
        let top = scores.iter().filter(|&&s| s == max).count() as f64;
        return scores
            .iter()
            .map(|&s| if s == max { 1.0 / top } else { 0.0 })
            .collect();
    }
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
