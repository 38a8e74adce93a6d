use crate::model::ModelHandle;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

/// Shared Application State
///
/// Holding a [`ModelHandle`] (not an `Option`) means a router cannot exist
/// before the model has loaded.
#[derive(Clone)]
pub struct AppState {
    pub model: ModelHandle,
    pub metrics: PrometheusHandle,
}

// --- DTOs (Data Transfer Objects) ---

#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub backend: &'static str,
    pub classes: usize,
}

/// Body of every error response.
#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<&'static str>,
}
