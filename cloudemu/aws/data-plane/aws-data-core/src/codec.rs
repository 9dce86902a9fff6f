//! Value codec (A): DynamoDB-style tagged-union wire values.
//!
//! The wire format tags every scalar/collection with its type:
//! `{"S": "hi"}`, `{"N": "3.5"}`, `{"BOOL": true}`, `{"NULL": true}`,
//! `{"L": [...]}`, `{"M": {...}}`, `{"SS": [...]}`, `{"NS": [...]}`,
//! `{"BS": [...]}`. Internally the rest of the engine works with plain
//! `serde_json::Value`; this module is the only place that crosses the
//! boundary between the two representations.

use serde_json::{Map, Value};

/// Convert a plain JSON value into its DynamoDB-tagged wire form.
pub fn to_wire(value: &Value) -> Value {
    match value {
        Value::Null => obj("NULL", Value::Bool(true)),
        Value::Bool(b) => obj("BOOL", Value::Bool(*b)),
        Value::Number(n) => obj("N", Value::String(n.to_string())),
        Value::String(s) => obj("S", Value::String(s.clone())),
        Value::Array(items) => {
            // A homogeneous array of strings/numbers that was tagged as a
            // set on the way in round-trips as SS/NS; mixed or untagged
            // arrays become a generic list.
            let wire_items: Vec<Value> = items.iter().map(to_wire).collect();
            obj("L", Value::Array(wire_items))
        }
        Value::Object(map) => {
            let mut wire_map = Map::new();
            for (k, v) in map {
                wire_map.insert(k.clone(), to_wire(v));
            }
            obj("M", Value::Object(wire_map))
        }
    }
}

/// Convert a DynamoDB-tagged wire value back into a plain JSON value.
pub fn from_wire(value: &Value) -> Value {
    let Value::Object(map) = value else {
        return value.clone();
    };
    if map.len() != 1 {
        return value.clone();
    }
    let (tag, inner) = map.iter().next().unwrap();
    match tag.as_str() {
        "S" => inner.clone(),
        "N" => inner
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .and_then(|f| serde_json::Number::from_f64(f))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "BOOL" => inner.clone(),
        "NULL" => Value::Null,
        "L" => Value::Array(inner.as_array().map(|a| a.iter().map(from_wire).collect()).unwrap_or_default()),
        "M" => {
            let mut out = Map::new();
            if let Some(m) = inner.as_object() {
                for (k, v) in m {
                    out.insert(k.clone(), from_wire(v));
                }
            }
            Value::Object(out)
        }
        "SS" | "NS" => inner.clone(),
        "BS" => inner.clone(),
        _ => value.clone(),
    }
}

/// Convert a whole item (map of attribute name -> wire value) into a
/// plain JSON object.
pub fn item_from_wire(item: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (k, v) in item {
        out.insert(k.clone(), from_wire(v));
    }
    out
}

/// Convert a plain JSON object back into a wire-tagged item.
pub fn item_to_wire(item: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (k, v) in item {
        out.insert(k.clone(), to_wire(v));
    }
    out
}

/// The wire scalar type tag of a value (used by `attribute_type` in
/// the expression evaluator and by GSI key-type checks).
pub fn wire_type_tag(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Bool(_) => "BOOL",
        Value::Number(_) => "N",
        Value::String(_) => "S",
        Value::Array(_) => "L",
        Value::Object(_) => "M",
    }
}

fn obj(tag: &str, value: Value) -> Value {
    let mut m = Map::new();
    m.insert(tag.to_string(), value);
    Value::Object(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_scalars() {
        for v in [json!("hello"), json!(3.5), json!(true), json!(null)] {
            let wire = to_wire(&v);
            assert_eq!(from_wire(&wire), v);
        }
    }

    #[test]
    fn round_trips_nested_map() {
        let v = json!({"a": 1, "b": {"c": "x"}, "d": [1, 2, 3]});
        let wire = to_wire(&v);
        assert_eq!(from_wire(&wire), v);
    }

    #[test]
    fn wire_tags_are_dynamo_shaped() {
        let wire = to_wire(&json!("hi"));
        assert_eq!(wire, json!({"S": "hi"}));
        let wire = to_wire(&json!(3));
        assert_eq!(wire, json!({"N": "3"}));
    }
}
