use crate::error::{InferenceError, ModelLoadError};
use crate::preprocessing::{numeric_value, StructuredInput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Descriptor file every model directory carries.
pub const MANIFEST_FILE: &str = "predictor.json";

/// Highest `format_version` this build can open.
pub const SUPPORTED_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub format_version: u32,
    #[serde(flatten)]
    pub backend: BackendConfig,
    /// Target column. Dropped from batch inputs before scoring.
    pub label: String,
    /// Class labels in the order the backend emits scores.
    pub classes: Vec<String>,
    pub features: Vec<FeatureSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BackendConfig {
    Linear {
        #[serde(default = "default_linear_weights")]
        weights: String,
    },
    Onnx {
        #[serde(default = "default_onnx_graph")]
        graph: String,
        #[serde(default)]
        output_index: usize,
    },
}

impl BackendConfig {
    pub fn name(&self) -> &'static str {
        match self {
            BackendConfig::Linear { .. } => "linear",
            BackendConfig::Onnx { .. } => "onnx",
        }
    }
}

fn default_linear_weights() -> String {
    "linear.json".to_string()
}

fn default_onnx_graph() -> String {
    "model.onnx".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub kind: FeatureKind,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Numeric,
    Categorical,
    Text,
    /// Path to an image file. Batch scoring resolves it against the input
    /// directory.
    Image,
}

/// Only the version is read first, so that a newer artifact with a different
/// layout still reports a version mismatch instead of a parse error.
#[derive(Deserialize)]
struct VersionProbe {
    format_version: u32,
}

impl ModelManifest {
    /// Reads and validates `predictor.json` inside `dir`.
    pub fn read(dir: &Path) -> Result<Self, ModelLoadError> {
        let path = dir.join(MANIFEST_FILE);
        let raw = fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ModelLoadError::NotFound(path.clone()),
            _ => corrupt(&path, e),
        })?;
        Self::parse(&raw, &path)
    }

    pub fn parse(raw: &[u8], path: &Path) -> Result<Self, ModelLoadError> {
        let probe: VersionProbe = serde_json::from_slice(raw).map_err(|e| corrupt(path, e))?;
        if probe.format_version == 0 || probe.format_version > SUPPORTED_FORMAT_VERSION {
            return Err(ModelLoadError::IncompatibleVersion {
                found: probe.format_version,
                supported: SUPPORTED_FORMAT_VERSION,
            });
        }

        let manifest: ModelManifest = serde_json::from_slice(raw).map_err(|e| corrupt(path, e))?;
        manifest.check_consistency().map_err(|reason| corrupt(path, reason))?;
        Ok(manifest)
    }

    fn check_consistency(&self) -> Result<(), String> {
        if self.classes.len() < 2 {
            return Err(format!(
                "a classifier needs at least two classes, found {}",
                self.classes.len()
            ));
        }
        let mut classes = HashSet::new();
        if let Some(duplicate) = self.classes.iter().find(|c| !classes.insert(c.as_str())) {
            return Err(format!("duplicate class `{duplicate}`"));
        }

        if self.features.is_empty() {
            return Err("no features declared".to_string());
        }
        let mut names = HashSet::new();
        for feature in &self.features {
            if !names.insert(feature.name.as_str()) {
                return Err(format!("duplicate feature `{}`", feature.name));
            }
            if feature.name == self.label {
                return Err(format!("label column `{}` is also declared as a feature", self.label));
            }
        }
        Ok(())
    }

    pub fn features_of(&self, kind: FeatureKind) -> impl Iterator<Item = &FeatureSpec> + '_ {
        self.features.iter().filter(move |f| f.kind == kind)
    }

    /// Rejects inputs the predictor could not score: missing required
    /// features and numeric features that do not parse as finite numbers.
    pub fn check_input(&self, input: &StructuredInput) -> Result<(), InferenceError> {
        for (index, record) in input.records().iter().enumerate() {
            for feature in &self.features {
                let value = record.get(&feature.name).filter(|v| !v.is_null());
                let Some(value) = value else {
                    if feature.required {
                        return Err(InferenceError::MalformedPayload(format!(
                            "record {index}: missing required feature `{}`",
                            feature.name
                        )));
                    }
                    continue;
                };

                match feature.kind {
                    FeatureKind::Numeric if numeric_value(value).is_none() => {
                        return Err(InferenceError::MalformedPayload(format!(
                            "record {index}: feature `{}` must be a finite number, got {value}",
                            feature.name
                        )));
                    }
                    FeatureKind::Categorical | FeatureKind::Text | FeatureKind::Image
                        if matches!(value, Value::Array(_) | Value::Object(_)) =>
                    {
                        return Err(InferenceError::MalformedPayload(format!(
                            "record {index}: feature `{}` must be a scalar",
                            feature.name
                        )));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

fn corrupt(path: &Path, reason: impl ToString) -> ModelLoadError {
    ModelLoadError::Corrupt {
        path: PathBuf::from(path),
        reason: reason.to_string(),
    }
}
