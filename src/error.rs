use crate::server::types::ErrorBody;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Reasons a model directory could not be turned into a usable handle.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("Model not found at path: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Corrupt model artifact {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Incompatible artifact format version {found} (this build supports up to {supported})")]
    IncompatibleVersion { found: u32, supported: u32 },

    #[error("ONNX Runtime error: {0}")]
    Backend(#[from] ort::Error),
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Failed to load model: {0}")]
    ModelLoad(#[from] ModelLoadError),

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Prediction error: {0}")]
    Prediction(String),
}

/// Stable, payload-free name of an [`InferenceError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ModelLoad,
    UnsupportedContentType,
    MalformedPayload,
    Serialization,
    Prediction,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ModelLoad => "ModelLoadError",
            ErrorKind::UnsupportedContentType => "UnsupportedContentType",
            ErrorKind::MalformedPayload => "MalformedPayload",
            ErrorKind::Serialization => "SerializationError",
            ErrorKind::Prediction => "PredictionError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InferenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InferenceError::ModelLoad(_) => ErrorKind::ModelLoad,
            InferenceError::UnsupportedContentType(_) => ErrorKind::UnsupportedContentType,
            InferenceError::MalformedPayload(_) => ErrorKind::MalformedPayload,
            InferenceError::Serialization(_) => ErrorKind::Serialization,
            InferenceError::Prediction(_) => ErrorKind::Prediction,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            InferenceError::UnsupportedContentType(_) | InferenceError::MalformedPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            InferenceError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            InferenceError::Serialization(_) | InferenceError::Prediction(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for InferenceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody {
            error: self.to_string(),
            kind: self.kind().as_str(),
            stage: None,
        });

        (status, body).into_response()
    }
}
