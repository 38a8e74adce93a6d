use axum::{
    body::Bytes,
    extract::State,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderMap, HeaderName,
    },
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, warn};

use crate::error::InferenceError;
use crate::pipeline;
use crate::server::types::*;

pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe. The router only exists once the model is loaded, so
/// answering at all means ready.
pub async fn ping(State(state): State<Arc<AppState>>) -> Json<PingResponse> {
    let manifest = state.model.manifest();
    Json(PingResponse {
        status: "ready",
        backend: manifest.backend.name(),
        classes: manifest.classes.len(),
    })
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render()
}

/// `Content-Type` names the request format, `Accept` the desired response
/// format.
pub async fn invocations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let input_content_type = header_str(&headers, CONTENT_TYPE).unwrap_or_default().to_string();
    let accept = header_str(&headers, ACCEPT).map(str::to_string);
    let model = state.model.clone();

    // Prediction is synchronous and may be slow; keep it off the async workers.
    let joined = tokio::task::spawn_blocking(move || {
        pipeline::transform(&model, &body, &input_content_type, accept.as_deref())
    })
    .await;

    match joined {
        Ok(Ok(encoded)) => (
            [(CONTENT_TYPE, encoded.content_type.as_mime())],
            encoded.body,
        )
            .into_response(),
        Ok(Err(failure)) => {
            if failure.error.status().is_server_error() {
                error!(stage = failure.stage.name(), kind = %failure.error.kind(), "{}", failure.error);
            } else {
                warn!(stage = failure.stage.name(), kind = %failure.error.kind(), "{}", failure.error);
            }
            failure.into_response()
        }
        Err(e) => {
            error!("prediction task did not complete: {e}");
            InferenceError::Prediction(format!("prediction task did not complete: {e}")).into_response()
        }
    }
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
