//! Choice state rule evaluation: the comparison grid ASL defines for
//! `Choices` entries, plus the `And`/`Or`/`Not` combinators.

use aws_data_core::path;
use serde_json::Value;

/// Walk `rules` in order and return the `Next` of the first one that
/// matches `input`. `None` means no rule matched (caller falls back to
/// `Default`).
pub fn evaluate(rules: &[Value], input: &Value) -> Option<String> {
    rules.iter().find_map(|rule| {
        if evaluate_rule(rule, input) {
            rule.get("Next").and_then(Value::as_str).map(str::to_string)
        } else {
            None
        }
    })
}

fn evaluate_rule(rule: &Value, input: &Value) -> bool {
    let Some(obj) = rule.as_object() else { return false };

    if let Some(Value::Array(clauses)) = obj.get("And") {
        return clauses.iter().all(|c| evaluate_rule(c, input));
    }
    if let Some(Value::Array(clauses)) = obj.get("Or") {
        return clauses.iter().any(|c| evaluate_rule(c, input));
    }
    if let Some(clause) = obj.get("Not") {
        return !evaluate_rule(clause, input);
    }

    let Some(variable) = obj.get("Variable").and_then(Value::as_str) else { return false };
    let actual = path::extract(variable, input).unwrap_or(Value::Null);

    for (op, expected) in obj {
        if let Some(result) = compare(op, expected, &actual, input) {
            return result;
        }
    }
    false
}

/// Evaluate a single `"<Operator>": <expected>` pair against `actual`,
/// resolving a `<Operator>Path` variant's `expected` through `input`
/// first. Returns `None` for keys that aren't comparison operators
/// (`Variable`, `Next`) so the caller can keep scanning the object.
fn compare(op: &str, expected: &Value, actual: &Value, input: &Value) -> Option<bool> {
    let (op, expected) = if let Some(base) = op.strip_suffix("Path") {
        let resolved = expected.as_str().map(|p| path::extract(p, input).unwrap_or(Value::Null))?;
        (base, resolved)
    } else {
        (op, expected.clone())
    };

    match op {
        "StringEquals" => Some(actual.as_str() == expected.as_str()),
        "StringLessThan" => str_cmp(actual, &expected, |a, b| a < b),
        "StringLessThanEquals" => str_cmp(actual, &expected, |a, b| a <= b),
        "StringGreaterThan" => str_cmp(actual, &expected, |a, b| a > b),
        "StringGreaterThanEquals" => str_cmp(actual, &expected, |a, b| a >= b),
        "NumericEquals" => num_cmp(actual, &expected, |a, b| (a - b).abs() < f64::EPSILON),
        "NumericLessThan" => num_cmp(actual, &expected, |a, b| a < b),
        "NumericLessThanEquals" => num_cmp(actual, &expected, |a, b| a <= b),
        "NumericGreaterThan" => num_cmp(actual, &expected, |a, b| a > b),
        "NumericGreaterThanEquals" => num_cmp(actual, &expected, |a, b| a >= b),
        "BooleanEquals" => Some(actual.as_bool() == expected.as_bool()),
        "TimestampEquals" => ts_cmp(actual, &expected, |a, b| a == b),
        "TimestampLessThan" => ts_cmp(actual, &expected, |a, b| a < b),
        "TimestampLessThanEquals" => ts_cmp(actual, &expected, |a, b| a <= b),
        "TimestampGreaterThan" => ts_cmp(actual, &expected, |a, b| a > b),
        "TimestampGreaterThanEquals" => ts_cmp(actual, &expected, |a, b| a >= b),
        "IsNull" => Some(actual.is_null() == expected.as_bool().unwrap_or(true)),
        "IsPresent" => Some((!actual.is_null()) == expected.as_bool().unwrap_or(true)),
        "IsString" => Some(actual.is_string() == expected.as_bool().unwrap_or(true)),
        "IsNumeric" => Some(actual.is_number() == expected.as_bool().unwrap_or(true)),
        "IsBoolean" => Some(actual.is_boolean() == expected.as_bool().unwrap_or(true)),
        _ => None,
    }
}

fn str_cmp(a: &Value, b: &Value, f: impl Fn(&str, &str) -> bool) -> Option<bool> {
    Some(f(a.as_str()?, b.as_str()?))
}

fn num_cmp(a: &Value, b: &Value, f: impl Fn(f64, f64) -> bool) -> Option<bool> {
    Some(f(a.as_f64()?, b.as_f64()?))
}

fn ts_cmp(a: &Value, b: &Value, f: impl Fn(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>) -> bool) -> Option<bool> {
    let parse = |v: &Value| chrono::DateTime::parse_from_rfc3339(v.as_str()?).ok().map(|d| d.with_timezone(&chrono::Utc));
    Some(f(parse(a)?, parse(b)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_and_string_rules() {
        let rules = vec![
            json!({"Variable": "$.amount", "NumericGreaterThan": 100, "Next": "Big"}),
            json!({"Variable": "$.name", "StringEquals": "bob", "Next": "Bob"}),
        ];
        assert_eq!(evaluate(&rules, &json!({"amount": 150})), Some("Big".to_string()));
        assert_eq!(evaluate(&rules, &json!({"amount": 1, "name": "bob"})), Some("Bob".to_string()));
        assert_eq!(evaluate(&rules, &json!({"amount": 1, "name": "alice"})), None);
    }

    #[test]
    fn and_or_not_combinators() {
        let rules = vec![json!({
            "And": [
                {"Variable": "$.a", "NumericGreaterThan": 0},
                {"Not": {"Variable": "$.b", "IsNull": true}}
            ],
            "Next": "Match"
        })];
        assert_eq!(evaluate(&rules, &json!({"a": 1, "b": "x"})), Some("Match".to_string()));
        assert_eq!(evaluate(&rules, &json!({"a": 1})), None);
    }
}
