//! `InputPath`/`OutputPath`/`ResultPath` filtering and `Parameters`/
//! `ResultSelector` payload templates — the JSONPath-flavored plumbing
//! every state type threads its I/O through.

use aws_data_core::path;
use serde_json::{Map, Value};

pub fn apply_input_path(input: &Value, input_path: Option<&str>) -> Value {
    match input_path {
        None | Some("$") => input.clone(),
        Some(p) => path::extract(p, input).unwrap_or(Value::Null),
    }
}

pub fn apply_output_path(output: &Value, output_path: Option<&str>) -> Value {
    match output_path {
        None | Some("$") => output.clone(),
        Some(p) => path::extract(p, output).unwrap_or(Value::Null),
    }
}

/// `ResultPath` has three distinct meanings depending on how it was
/// (not) supplied: omitted means replace the state's whole output with
/// `result` (default `"$"`); an explicit JSON `null` discards `result`
/// and passes `input` through unchanged; anything else merges `result`
/// into `input` at that path.
pub fn apply_result_path(input: &Value, result: Value, result_path: Option<&Value>) -> Value {
    match result_path {
        None => result,
        Some(Value::Null) => input.clone(),
        Some(Value::String(p)) if p == "$" => result,
        Some(Value::String(p)) => {
            let mut merged = input.clone();
            if path::Path::parse(p).and_then(|parsed| parsed.assign(&mut merged, result)).is_err() {
                return input.clone();
            }
            merged
        }
        Some(_) => result,
    }
}

/// Render a `Parameters`/`ResultSelector` payload template: object keys
/// ending in `.$` are path references resolved against `input`
/// (`$$.*` reaches into `context` instead); every other key is a
/// literal, recursed into for nested objects/arrays.
pub fn apply_template(template: &Value, input: &Value, context: &Value) -> Value {
    match template {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                if let Some(base) = key.strip_suffix(".$") {
                    let resolved = value
                        .as_str()
                        .map(|p| path::resolve_with_context(p, input, context).unwrap_or(Value::Null))
                        .unwrap_or(Value::Null);
                    out.insert(base.to_string(), resolved);
                } else {
                    out.insert(key.clone(), apply_template(value, input, context));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| apply_template(v, input, context)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_path_null_discards_result() {
        let input = json!({"x": 1});
        let out = apply_result_path(&input, json!({"y": 2}), Some(&Value::Null));
        assert_eq!(out, input);
    }

    #[test]
    fn result_path_merges_at_field() {
        let input = json!({"x": 1});
        let out = apply_result_path(&input, json!(42), Some(&Value::String("$.y".into())));
        assert_eq!(out, json!({"x": 1, "y": 42}));
    }

    #[test]
    fn template_resolves_path_and_context_refs() {
        let input = json!({"id": 7});
        let context = json!({"Map": {"Item": {"Index": 3}}});
        let template = json!({"id.$": "$.id", "index.$": "$$.Map.Item.Index", "fixed": "value"});
        let out = apply_template(&template, &input, &context);
        assert_eq!(out, json!({"id": 7, "index": 3, "fixed": "value"}));
    }
}
