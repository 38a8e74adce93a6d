//! Response encoding: prediction results into the negotiated content type.

pub mod delimited;
pub mod json;

use crate::content_type::ContentType;
use crate::error::InferenceError;
use crate::model::PredictionResult;
use tracing::warn;

/// Serialized response body and the format it is actually in.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub body: Vec<u8>,
    pub content_type: ContentType,
}

/// Serializes `result` for the requested output type.
///
/// Unsupported requests fall back to JSON, and the returned content type says
/// so.
pub fn encode(
    result: &PredictionResult,
    output_content_type: Option<&str>,
) -> Result<Encoded, InferenceError> {
    let content_type = ContentType::negotiate(output_content_type).unwrap_or_else(|| {
        warn!(
            requested = output_content_type.unwrap_or_default(),
            fallback = ContentType::DEFAULT.as_mime(),
            "unsupported output content type"
        );
        ContentType::DEFAULT
    });

    let body = encode_as(result, content_type)?;
    Ok(Encoded { body, content_type })
}

pub fn encode_as(result: &PredictionResult, content_type: ContentType) -> Result<Vec<u8>, InferenceError> {
    match content_type {
        ContentType::Json => json::encode(result),
        ContentType::JsonLines => json::encode_lines(result),
        ContentType::Csv => delimited::encode(result),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::model::{Prediction, PredictionResult};
    use std::sync::Arc;

    pub(crate) fn result(rows: &[(&str, [f64; 2])], single: bool) -> PredictionResult {
        PredictionResult {
            classes: Arc::from(vec!["negative".to_string(), "positive".to_string()]),
            predictions: rows
                .iter()
                .map(|(label, probabilities)| Prediction {
                    label: label.to_string(),
                    probabilities: Some(probabilities.to_vec()),
                })
                .collect(),
            single,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::result;
    use super::*;

    #[test]
    fn test_encode_honours_supported_request() {
        let encoded = encode(&result(&[("positive", [0.2, 0.8])], false), Some("text/csv")).unwrap();
        assert_eq!(encoded.content_type, ContentType::Csv);
        assert!(String::from_utf8(encoded.body).unwrap().starts_with("label,"));
    }

    #[test]
    fn test_encode_falls_back_to_json_and_says_so() {
        let encoded =
            encode(&result(&[("positive", [0.2, 0.8])], true), Some("application/xml")).unwrap();
        assert_eq!(encoded.content_type, ContentType::Json);
        let body: serde_json::Value = serde_json::from_slice(&encoded.body).unwrap();
        assert_eq!(body["label"], "positive");
    }

    #[test]
    fn test_encode_defaults_to_json() {
        let encoded = encode(&result(&[("negative", [0.9, 0.1])], true), None).unwrap();
        assert_eq!(encoded.content_type, ContentType::Json);
    }

    #[test]
    fn test_nan_is_a_serialization_error_for_json_only() {
        let broken = result(&[("negative", [f64::NAN, 0.5])], true);
        assert!(matches!(
            encode(&broken, Some("application/json")),
            Err(InferenceError::Serialization(_))
        ));
        assert!(matches!(
            encode(&broken, Some("application/jsonlines")),
            Err(InferenceError::Serialization(_))
        ));
        assert!(encode(&broken, Some("text/csv")).is_ok());
    }
}
