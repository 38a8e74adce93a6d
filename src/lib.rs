pub mod batch;
pub mod config;
pub mod content_type;
pub mod error;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod postprocessing;
pub mod preprocessing;
pub mod server;


// Re-export common types
pub use content_type::ContentType;
pub use error::{ErrorKind, InferenceError, ModelLoadError};
pub use model::{load, ModelHandle, PredictionResult};
pub use pipeline::{transform, Failure, Stage};
pub use postprocessing::{encode, Encoded};
pub use preprocessing::{decode, StructuredInput};
