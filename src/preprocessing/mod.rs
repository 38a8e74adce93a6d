//! Request decoding: raw body + declared content type into records the
//! predictor can consume.

pub mod delimited;
pub mod json;

use crate::content_type::ContentType;
use crate::error::InferenceError;
use serde_json::Value;
use std::borrow::Cow;

/// Largest magnitude below which every integer is exact in an f64.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// One input row, keyed by column name.
pub type Record = serde_json::Map<String, Value>;

/// Decoded request body.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredInput {
    records: Vec<Record>,
    single: bool,
}

impl StructuredInput {
    /// A request that carried exactly one record (e.g. a bare JSON object).
    pub fn single(record: Record) -> Self {
        Self {
            records: vec![record],
            single: true,
        }
    }

    /// A request that carried a list of records. Empty lists are rejected.
    pub fn batch(records: Vec<Record>) -> Result<Self, InferenceError> {
        if records.is_empty() {
            return Err(InferenceError::MalformedPayload(
                "request contains no records".to_string(),
            ));
        }
        Ok(Self {
            records,
            single: false,
        })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn is_single(&self) -> bool {
        self.single
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Decodes `body` according to the declared `content_type` string.
pub fn decode(body: &[u8], content_type: &str) -> Result<StructuredInput, InferenceError> {
    let content_type: ContentType = content_type.parse()?;
    decode_as(body, content_type)
}

pub fn decode_as(body: &[u8], content_type: ContentType) -> Result<StructuredInput, InferenceError> {
    match content_type {
        ContentType::Json => json::decode(body),
        ContentType::JsonLines => json::decode_lines(body),
        ContentType::Csv => delimited::decode(body),
    }
}

/// Reads a field as a finite number. CSV cells arrive as strings, so numeric
/// text is accepted too.
pub fn numeric_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Reads a scalar field as text. Nulls, arrays and objects have no text form.
///
/// Integral floats print without a fraction, so JSON `1.0` reads as `1` like
/// the CSV cell it would have been.
pub fn text_value(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(match n.as_f64() {
            Some(x) if n.is_f64() && x.fract() == 0.0 && x.abs() < MAX_EXACT_INTEGER => {
                (x as i64).to_string()
            }
            _ => n.to_string(),
        })),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        _ => None,
    }
}

fn malformed(message: impl Into<String>) -> InferenceError {
    InferenceError::MalformedPayload(message.into())
}
