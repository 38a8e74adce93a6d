//! Model directories written on the fly for tests.

use serde_json::{json, Value};
use std::fs;
use std::path::Path;

fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

/// Binary sentiment model over a `text` column with an optional `stars`
/// rating.
pub(crate) fn write_sentiment_model(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    write_json(
        &dir.join("predictor.json"),
        &json!({
            "format_version": 1,
            "backend": "linear",
            "label": "sentiment",
            "classes": ["negative", "positive"],
            "features": [
                {"name": "text", "kind": "text"},
                {"name": "stars", "kind": "numeric", "required": false}
            ]
        }),
    );
    write_json(
        &dir.join("linear.json"),
        &json!({
            "bias": [0.0, 0.0],
            "token_weights": {
                "great": [-1.5, 1.5],
                "product": [0.0, 0.1],
                "terrible": [2.0, -2.0],
                "broken": [1.0, -1.0]
            },
            "numeric_weights": {
                "stars": [-0.5, 0.5]
            }
        }),
    );
}

/// Three-class pet adoption-speed model mixing every feature kind.
pub(crate) fn write_adoption_model(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    write_json(
        &dir.join("predictor.json"),
        &json!({
            "format_version": 1,
            "backend": "linear",
            "label": "AdoptionSpeed",
            "classes": ["0", "1", "2"],
            "features": [
                {"name": "Type", "kind": "categorical"},
                {"name": "Age", "kind": "numeric"},
                {"name": "Description", "kind": "text", "required": false},
                {"name": "Images", "kind": "image"}
            ]
        }),
    );
    write_json(
        &dir.join("linear.json"),
        &json!({
            "bias": [0.0, 0.0, 0.0],
            "token_weights": {
                "Type=1": [1.0, 0.0, -1.0],
                "Type=2": [-0.5, 0.0, 0.5],
                "playful": [1.0, 0.0, 0.0],
                "puppy": [1.0, 0.0, 0.0],
                "shy": [0.0, 0.0, 1.0]
            },
            "numeric_weights": {
                "Age": [-0.05, 0.0, 0.05]
            }
        }),
    );
}

/// Two-class ONNX model: a single opset-13 `Softmax` over a `[N, 2]` input.
/// `x1` is optional. Passing more than two classes makes the graph's output
/// narrower than the manifest.
pub(crate) fn write_softmax_onnx_model(dir: &Path, classes: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    write_json(
        &dir.join("predictor.json"),
        &json!({
            "format_version": 1,
            "backend": "onnx",
            "label": "y",
            "classes": classes,
            "features": [
                {"name": "x0", "kind": "numeric"},
                {"name": "x1", "kind": "numeric", "required": false}
            ]
        }),
    );
    fs::write(dir.join("model.onnx"), softmax_graph()).unwrap();
}

// Protobuf wire encoding, just enough for a ModelProto.

fn varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn int_field(out: &mut Vec<u8>, field: u64, value: u64) {
    varint(out, field << 3);
    varint(out, value);
}

fn bytes_field(out: &mut Vec<u8>, field: u64, bytes: &[u8]) {
    varint(out, (field << 3) | 2);
    varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// ValueInfoProto for a float tensor of shape `[N, width]`.
fn float_matrix_info(name: &str, width: u64) -> Vec<u8> {
    let mut batch_dim = Vec::new();
    bytes_field(&mut batch_dim, 2, b"N"); // dim_param
    let mut width_dim = Vec::new();
    int_field(&mut width_dim, 1, width); // dim_value

    let mut shape = Vec::new();
    bytes_field(&mut shape, 1, &batch_dim);
    bytes_field(&mut shape, 1, &width_dim);

    let mut tensor = Vec::new();
    int_field(&mut tensor, 1, 1); // elem_type FLOAT
    bytes_field(&mut tensor, 2, &shape);

    let mut type_proto = Vec::new();
    bytes_field(&mut type_proto, 1, &tensor);

    let mut info = Vec::new();
    bytes_field(&mut info, 1, name.as_bytes());
    bytes_field(&mut info, 2, &type_proto);
    info
}

fn softmax_graph() -> Vec<u8> {
    let mut node = Vec::new();
    bytes_field(&mut node, 1, b"features");
    bytes_field(&mut node, 2, b"probabilities");
    bytes_field(&mut node, 3, b"softmax");
    bytes_field(&mut node, 4, b"Softmax");

    let mut graph = Vec::new();
    bytes_field(&mut graph, 1, &node);
    bytes_field(&mut graph, 2, b"classifier");
    bytes_field(&mut graph, 11, &float_matrix_info("features", 2));
    bytes_field(&mut graph, 12, &float_matrix_info("probabilities", 2));

    let mut opset = Vec::new();
    int_field(&mut opset, 2, 13);

    let mut model = Vec::new();
    int_field(&mut model, 1, 7); // ir_version
    bytes_field(&mut model, 2, b"tabserve-tests");
    bytes_field(&mut model, 7, &graph);
    bytes_field(&mut model, 8, &opset);
    model
}
