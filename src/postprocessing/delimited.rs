use crate::error::InferenceError;
use crate::model::PredictionResult;

/// `text/csv`: a `label` column, then one column per class when
/// probabilities are available.
pub fn encode(result: &PredictionResult) -> Result<Vec<u8>, InferenceError> {
    let with_probabilities = result
        .predictions
        .iter()
        .any(|p| p.probabilities.is_some());

    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["label"];
    if with_probabilities {
        header.extend(result.classes.iter().map(String::as_str));
    }
    writer.write_record(&header).map_err(serialization)?;

    for prediction in &result.predictions {
        let mut row = vec![prediction.label.clone()];
        if with_probabilities {
            match &prediction.probabilities {
                Some(probabilities) => row.extend(probabilities.iter().map(f64::to_string)),
                None => row.extend(result.classes.iter().map(|_| String::new())),
            }
        }
        writer.write_record(&row).map_err(serialization)?;
    }

    writer
        .into_inner()
        .map_err(|e| InferenceError::Serialization(e.to_string()))
}

fn serialization(e: csv::Error) -> InferenceError {
    InferenceError::Serialization(e.to_string())
}
