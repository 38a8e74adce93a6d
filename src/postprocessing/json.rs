use crate::error::InferenceError;
use crate::model::{Prediction, PredictionResult};
use serde_json::{Map, Number, Value};

/// `application/json`: a single-record request gets the prediction object
/// itself, a batch gets `{"predictions": [...]}`.
pub fn encode(result: &PredictionResult) -> Result<Vec<u8>, InferenceError> {
    let mut objects = result
        .predictions
        .iter()
        .map(|prediction| to_object(&result.classes, prediction))
        .collect::<Result<Vec<Value>, _>>()?;

    let document = if result.single && objects.len() == 1 {
        objects.remove(0)
    } else {
        let mut envelope = Map::new();
        envelope.insert("predictions".to_string(), Value::Array(objects));
        Value::Object(envelope)
    };

    serde_json::to_vec(&document).map_err(|e| InferenceError::Serialization(e.to_string()))
}

/// `application/jsonlines`: one prediction object per line.
pub fn encode_lines(result: &PredictionResult) -> Result<Vec<u8>, InferenceError> {
    let mut body = Vec::new();
    for prediction in &result.predictions {
        let object = to_object(&result.classes, prediction)?;
        serde_json::to_writer(&mut body, &object)
            .map_err(|e| InferenceError::Serialization(e.to_string()))?;
        body.push(b'\n');
    }
    Ok(body)
}

fn to_object(classes: &[String], prediction: &Prediction) -> Result<Value, InferenceError> {
    let mut object = Map::new();
    object.insert("label".to_string(), Value::String(prediction.label.clone()));

    if let Some(probabilities) = &prediction.probabilities {
        let mut per_class = Map::new();
        for (class, &p) in classes.iter().zip(probabilities) {
            // serde_json would quietly write NaN as null; refuse instead.
            let number = Number::from_f64(p).ok_or_else(|| {
                InferenceError::Serialization(format!(
                    "probability {p} for class `{class}` is not representable in JSON"
                ))
            })?;
            per_class.insert(class.clone(), Value::Number(number));
        }
        object.insert("probabilities".to_string(), Value::Object(per_class));
    }

    Ok(Value::Object(object))
}
