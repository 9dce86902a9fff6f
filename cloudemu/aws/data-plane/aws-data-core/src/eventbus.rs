//! Event bus dispatch (component G, event-bus half): matches an
//! incoming event against every enabled rule on its bus using the
//! EventBridge content-filter dialect (exact match, numeric `{"numeric":
//! [...]}`, prefix `{"prefix": "..."}`, `{"exists": true/false}`, and
//! `{"anything-but": ...}` at any nesting depth of the pattern), then
//! hands matches to [`crate::fabric`] for delivery.
//!
//! Pure matching logic lives here with no storage dependency so it can
//! be unit tested directly against JSON fixtures.

use serde_json::Value;

/// Does `event` satisfy `pattern`? Both are plain JSON objects; keys
/// present in the pattern but absent from the event never match
/// (including under `"exists": false`, which is the one case that
/// inverts that rule).
pub fn matches_pattern(pattern: &Value, event: &Value) -> bool {
    let (Some(pattern), Some(event)) = (pattern.as_object(), event.as_object()) else { return false };
    pattern.iter().all(|(key, matcher)| match_field(matcher, event.get(key)))
}

fn match_field(matcher: &Value, event_value: Option<&Value>) -> bool {
    match matcher {
        Value::Array(rules) => rules.iter().any(|rule| match_rule(rule, event_value)),
        Value::Object(nested) => {
            let Some(Value::Object(event_obj)) = event_value else { return false };
            nested.iter().all(|(k, v)| match_field(v, event_obj.get(k)))
        }
        other => event_value.map(|v| v == other).unwrap_or(false),
    }
}

fn match_rule(rule: &Value, event_value: Option<&Value>) -> bool {
    match rule {
        Value::Object(obj) if obj.contains_key("exists") => {
            let want_exists = obj.get("exists").and_then(Value::as_bool).unwrap_or(true);
            want_exists == event_value.is_some()
        }
        Value::Object(obj) if obj.contains_key("prefix") => {
            let prefix = obj.get("prefix").and_then(Value::as_str).unwrap_or("");
            event_value.and_then(Value::as_str).map(|s| s.starts_with(prefix)).unwrap_or(false)
        }
        Value::Object(obj) if obj.contains_key("anything-but") => {
            let excluded = obj.get("anything-but").unwrap();
            match (excluded, event_value) {
                (Value::Array(excl), Some(v)) => !excl.iter().any(|e| e == v),
                (excl, Some(v)) => excl != v,
                (_, None) => false,
            }
        }
        Value::Object(obj) if obj.contains_key("numeric") => {
            let Some(Value::Array(ops)) = obj.get("numeric") else { return false };
            let Some(n) = event_value.and_then(Value::as_f64) else { return false };
            match_numeric(ops, n)
        }
        other => event_value.map(|v| v == other).unwrap_or(false),
    }
}

fn match_numeric(ops: &[Value], n: f64) -> bool {
    let mut i = 0;
    while i + 1 < ops.len() {
        let op = ops[i].as_str().unwrap_or("");
        let Some(bound) = ops[i + 1].as_f64() else { return false };
        let ok = match op {
            "=" => (n - bound).abs() < f64::EPSILON,
            ">" => n > bound,
            ">=" => n >= bound,
            "<" => n < bound,
            "<=" => n <= bound,
            _ => false,
        };
        if !ok {
            return false;
        }
        i += 2;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exact_match_on_nested_detail() {
        let pattern = json!({"source": ["app"], "detail": {"kind": ["order.created"]}});
        let event = json!({"source": "app", "detail": {"kind": "order.created", "id": 1}});
        assert!(matches_pattern(&pattern, &event));
    }

    #[test]
    fn prefix_and_exists_and_anything_but() {
        let pattern = json!({
            "detail": {
                "path": [{"prefix": "/orders/"}],
                "user": [{"exists": true}],
                "status": [{"anything-but": "deleted"}]
            }
        });
        let ok = json!({"detail": {"path": "/orders/42", "user": "alice", "status": "active"}});
        assert!(matches_pattern(&pattern, &ok));

        let bad = json!({"detail": {"path": "/carts/42", "user": "alice", "status": "active"}});
        assert!(!matches_pattern(&pattern, &bad));
    }

    #[test]
    fn numeric_range() {
        let pattern = json!({"detail": {"amount": [{"numeric": [">", 0, "<=", 100]}]}});
        assert!(matches_pattern(&pattern, &json!({"detail": {"amount": 50}})));
        assert!(!matches_pattern(&pattern, &json!({"detail": {"amount": 150}})));
    }

    #[test]
    fn missing_field_never_matches_unless_exists_false() {
        let pattern = json!({"detail": {"x": ["y"]}});
        assert!(!matches_pattern(&pattern, &json!({"detail": {}})));

        let exists_false = json!({"detail": {"x": [{"exists": false}]}});
        assert!(matches_pattern(&exists_false, &json!({"detail": {}})));
    }
}
