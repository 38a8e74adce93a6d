pub mod handle;
pub mod linear;
pub mod loader;
pub mod manifest;
pub mod onnx;

#[cfg(test)]
pub(crate) mod fixtures;

pub use handle::{ModelHandle, Prediction, PredictionResult, Predictor};
pub use loader::{load, load_with, LoadOptions};
