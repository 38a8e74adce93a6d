//! Per-request `decode → predict → encode` pipeline.
//!
//! A request moves `Idle → Decoding → Predicting → Encoding → Done`. Any error
//! moves it straight to `Failed`, which records the error kind. Both `Done`
//! and `Failed` are terminal. Nothing is retried here.

use crate::error::{ErrorKind, InferenceError};
use crate::model::ModelHandle;
use crate::observability;
use crate::postprocessing::{self, Encoded};
use crate::preprocessing;
use crate::server::types::ErrorBody;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Decoding,
    Predicting,
    Encoding,
    Done,
    Failed(ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Arrived,
    Succeeded,
    Errored(ErrorKind),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Decoding => "decoding",
            Stage::Predicting => "predicting",
            Stage::Encoding => "encoding",
            Stage::Done => "done",
            Stage::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed(_))
    }

    /// Transition function. Terminal stages absorb every event; events that
    /// do not apply to the current stage leave it unchanged.
    pub fn on(self, event: Event) -> Stage {
        match (self, event) {
            (stage, _) if stage.is_terminal() => stage,
            (_, Event::Errored(kind)) => Stage::Failed(kind),
            (Stage::Idle, Event::Arrived) => Stage::Decoding,
            (Stage::Decoding, Event::Succeeded) => Stage::Predicting,
            (Stage::Predicting, Event::Succeeded) => Stage::Encoding,
            (Stage::Encoding, Event::Succeeded) => Stage::Done,
            (stage, _) => stage,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Failed(kind) => write!(f, "failed({kind})"),
            stage => f.write_str(stage.name()),
        }
    }
}

/// A request that ended in `Failed`, with the stage it was in at the time.
#[derive(Error, Debug)]
#[error("{} stage failed: {error}", .stage.name())]
pub struct Failure {
    pub stage: Stage,
    #[source]
    pub error: InferenceError,
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let status = self.error.status();
        let body = Json(ErrorBody {
            error: self.error.to_string(),
            kind: self.error.kind().as_str(),
            stage: Some(self.stage.name()),
        });
        (status, body).into_response()
    }
}

/// Tracks one request through the stages.
#[derive(Debug)]
pub struct RequestLifecycle {
    stage: Stage,
}

impl RequestLifecycle {
    /// A request has arrived: `Idle → Decoding`.
    pub fn arrive() -> Self {
        Self {
            stage: Stage::Idle.on(Event::Arrived),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Runs the work of the current stage, then advances on success or moves
    /// to `Failed` on error.
    pub fn step<T>(
        &mut self,
        work: impl FnOnce() -> Result<T, InferenceError>,
    ) -> Result<T, Failure> {
        let stage = self.stage;
        debug!(stage = stage.name(), "entering stage");
        match work() {
            Ok(value) => {
                self.stage = stage.on(Event::Succeeded);
                Ok(value)
            }
            Err(error) => {
                self.stage = stage.on(Event::Errored(error.kind()));
                Err(Failure { stage, error })
            }
        }
    }
}

/// Runs one request against `model`.
///
/// Schema validation happens in the decoding stage, so a missing required
/// feature is reported as a malformed payload rather than a prediction
/// failure.
pub fn transform(
    model: &ModelHandle,
    body: &[u8],
    input_content_type: &str,
    output_content_type: Option<&str>,
) -> Result<Encoded, Failure> {
    let start = Instant::now();
    let mut lifecycle = RequestLifecycle::arrive();

    let outcome = run(
        &mut lifecycle,
        model,
        body,
        input_content_type,
        output_content_type,
    );

    let final_stage = match &outcome {
        Ok(_) => lifecycle.stage().name(),
        Err(failure) => failure.stage.name(),
    };
    observability::record_request(outcome.is_ok(), final_stage, start.elapsed());
    outcome
}

fn run(
    lifecycle: &mut RequestLifecycle,
    model: &ModelHandle,
    body: &[u8],
    input_content_type: &str,
    output_content_type: Option<&str>,
) -> Result<Encoded, Failure> {
    let input = lifecycle.step(|| {
        let input = preprocessing::decode(body, input_content_type)?;
        model.validate(&input)?;
        Ok(input)
    })?;
    let result = lifecycle.step(|| model.predict(&input))?;
    lifecycle.step(|| postprocessing::encode(&result, output_content_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_type::ContentType;
    use crate::model::{self, fixtures};

    const NON_TERMINAL: [Stage; 4] = [Stage::Idle, Stage::Decoding, Stage::Predicting, Stage::Encoding];

    fn sentiment_model() -> (tempfile::TempDir, ModelHandle) {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write_sentiment_model(dir.path());
        let handle = model::load(dir.path()).unwrap();
        (dir, handle)
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut stage = Stage::Idle;
        let mut seen = vec![stage];
        for event in [Event::Arrived, Event::Succeeded, Event::Succeeded, Event::Succeeded] {
            stage = stage.on(event);
            seen.push(stage);
        }
        assert_eq!(
            seen,
            [Stage::Idle, Stage::Decoding, Stage::Predicting, Stage::Encoding, Stage::Done]
        );
    }

    #[test]
    fn test_every_non_terminal_stage_can_fail() {
        for stage in NON_TERMINAL {
            assert_eq!(
                stage.on(Event::Errored(ErrorKind::Prediction)),
                Stage::Failed(ErrorKind::Prediction)
            );
        }
    }

    #[test]
    fn test_terminal_stages_absorb_events() {
        let failed = Stage::Failed(ErrorKind::MalformedPayload);
        for event in [Event::Arrived, Event::Succeeded, Event::Errored(ErrorKind::Serialization)] {
            assert_eq!(Stage::Done.on(event), Stage::Done);
            assert_eq!(failed.on(event), failed);
        }
    }

    #[test]
    fn test_out_of_order_events_are_ignored() {
        assert_eq!(Stage::Idle.on(Event::Succeeded), Stage::Idle);
        assert_eq!(Stage::Predicting.on(Event::Arrived), Stage::Predicting);
    }

    #[test]
    fn test_step_records_failing_stage() {
        let mut lifecycle = RequestLifecycle::arrive();
        assert_eq!(lifecycle.stage(), Stage::Decoding);

        let failure = lifecycle
            .step(|| -> Result<(), _> { Err(InferenceError::MalformedPayload("x".into())) })
            .unwrap_err();
        assert_eq!(failure.stage, Stage::Decoding);
        assert_eq!(lifecycle.stage(), Stage::Failed(ErrorKind::MalformedPayload));
        assert_eq!(failure.to_string(), "decoding stage failed: Malformed payload: x");
    }

    #[test]
    fn test_transform_success() {
        let (_dir, handle) = sentiment_model();
        let encoded = transform(
            &handle,
            br#"{"text": "great product"}"#,
            "application/json",
            Some("application/json"),
        )
        .unwrap();

        assert_eq!(encoded.content_type, ContentType::Json);
        let body: serde_json::Value = serde_json::from_slice(&encoded.body).unwrap();
        assert_eq!(body["label"], "positive");
    }

    #[test]
    fn test_transform_failures_name_their_stage() {
        let (_dir, handle) = sentiment_model();

        let failure = transform(&handle, b"<text/>", "application/xml", None).unwrap_err();
        assert_eq!(failure.stage, Stage::Decoding);
        assert_eq!(failure.error.kind(), ErrorKind::UnsupportedContentType);

        let failure = transform(&handle, br#"{"stars": 5}"#, "application/json", None).unwrap_err();
        assert_eq!(failure.stage, Stage::Decoding);
        assert_eq!(failure.error.kind(), ErrorKind::MalformedPayload);
    }

    #[test]
    fn test_transform_csv_in_csv_out() {
        let (_dir, handle) = sentiment_model();
        let encoded = transform(
            &handle,
            b"text,stars\ngreat product,5\nterrible,1\n",
            "text/csv",
            Some("text/csv"),
        )
        .unwrap();

        let text = String::from_utf8(encoded.body).unwrap();
        let labels: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap())
            .collect();
        assert_eq!(labels, ["positive", "negative"]);
    }
}
