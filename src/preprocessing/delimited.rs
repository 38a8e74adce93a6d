use super::{malformed, Record, StructuredInput};
use crate::error::InferenceError;
use serde_json::Value;
use std::collections::HashSet;

/// Decodes `text/csv`.
///
/// The first row names the columns. Cells stay strings (numeric features are
/// parsed later against the model schema); empty cells become `null`.
pub fn decode(body: &[u8]) -> Result<StructuredInput, InferenceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(body);

    let headers = reader
        .headers()
        .map_err(|e| malformed(format!("invalid CSV header: {e}")))?
        .clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(malformed("CSV body has no header row"));
    }

    let mut seen = HashSet::new();
    for name in headers.iter() {
        if !seen.insert(name) {
            return Err(malformed(format!("duplicate CSV column `{name}`")));
        }
    }

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        // Row numbers are 1-based and count the header.
        let row = row.map_err(|e| malformed(format!("row {}: {e}", index + 2)))?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(name, cell)| {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                (name.to_string(), value)
            })
            .collect();
        records.push(record);
    }

    if records.is_empty() {
        return Err(malformed("CSV body has a header but no data rows"));
    }
    StructuredInput::batch(records)
}
