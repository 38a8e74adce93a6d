use super::{malformed, Record, StructuredInput};
use crate::error::InferenceError;
use serde_json::Value;

/// Envelope key accepted for batched JSON requests: `{"instances": [...]}`.
const INSTANCES_KEY: &str = "instances";

/// Decodes `application/json`.
///
/// A bare object is a single record; an array of objects, or an object whose
/// only key is `instances` holding such an array, is a batch.
pub fn decode(body: &[u8]) -> Result<StructuredInput, InferenceError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    match value {
        Value::Object(mut object) => {
            let is_envelope = object.len() == 1
                && matches!(object.get(INSTANCES_KEY), Some(Value::Array(_)));
            if is_envelope {
                if let Some(Value::Array(items)) = object.remove(INSTANCES_KEY) {
                    return StructuredInput::batch(into_records(items)?);
                }
            }
            Ok(StructuredInput::single(object))
        }
        Value::Array(items) => StructuredInput::batch(into_records(items)?),
        other => Err(malformed(format!(
            "expected an object or an array of objects, got {}",
            describe(&other)
        ))),
    }
}

/// Decodes `application/jsonlines`: one object per non-blank line.
pub fn decode_lines(body: &[u8]) -> Result<StructuredInput, InferenceError> {
    let text = std::str::from_utf8(body).map_err(|e| malformed(format!("invalid UTF-8: {e}")))?;

    let mut records = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .map_err(|e| malformed(format!("line {}: invalid JSON: {e}", index + 1)))?;
        match value {
            Value::Object(record) => records.push(record),
            other => {
                return Err(malformed(format!(
                    "line {}: expected an object, got {}",
                    index + 1,
                    describe(&other)
                )))
            }
        }
    }

    StructuredInput::batch(records)
}

fn into_records(items: Vec<Value>) -> Result<Vec<Record>, InferenceError> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(record) => Ok(record),
            other => Err(malformed(format!(
                "record {index}: expected an object, got {}",
                describe(&other)
            ))),
        })
        .collect()
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
