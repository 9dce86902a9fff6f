//! Path engine (C): a JSON-path subset used by the workflow engine's
//! I/O processing and by choice-rule variable references.
//!
//! Supported grammar: `$` (root), `$$` (context root, resolved by the
//! caller into a separate root value), `.name`, `['name']`, `[index]`,
//! `[*]` (only valid as the final segment of a filter read, not in
//! assignment). This is intentionally a subset of full JSONPath — the
//! workflow engine never needs recursive descent (`..`) or script
//! filters.

use crate::error::{EmulatorError, Result};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(usize),
    Wildcard,
}

/// A parsed path, ready to be resolved/assigned against a root value.
#[derive(Debug, Clone)]
pub struct Path {
    /// `true` if the original string started with `$$` (context root).
    pub is_context: bool,
    segments: Vec<Segment>,
}

impl Path {
    pub fn parse(raw: &str) -> Result<Path> {
        let mut s = raw.trim();
        let is_context = if let Some(rest) = s.strip_prefix("$$") {
            s = rest;
            true
        } else if let Some(rest) = s.strip_prefix('$') {
            s = rest;
            false
        } else {
            return Err(EmulatorError::InvalidArgument(format!(
                "path must start with $ or $$: {raw}"
            )));
        };

        let mut segments = Vec::new();
        let chars: Vec<char> = s.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '.' => {
                    i += 1;
                    let start = i;
                    while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                        i += 1;
                    }
                    let name: String = chars[start..i].iter().collect();
                    if !name.is_empty() {
                        segments.push(Segment::Field(name));
                    }
                }
                '[' => {
                    let close = chars[i..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|p| p + i)
                        .ok_or_else(|| EmulatorError::InvalidArgument(format!("unterminated [ in path: {raw}")))?;
                    let inner: String = chars[i + 1..close].iter().collect();
                    let inner = inner.trim();
                    if inner == "*" {
                        segments.push(Segment::Wildcard);
                    } else if let Ok(idx) = inner.parse::<usize>() {
                        segments.push(Segment::Index(idx));
                    } else {
                        let name = inner.trim_matches(|c| c == '\'' || c == '"');
                        segments.push(Segment::Field(name.to_string()));
                    }
                    i = close + 1;
                }
                _ => {
                    return Err(EmulatorError::InvalidArgument(format!(
                        "unexpected character in path: {raw}"
                    )))
                }
            }
        }

        Ok(Path { is_context, segments })
    }

    /// Resolve this path against `root`, returning `None` if any
    /// intermediate segment is missing.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for seg in &self.segments {
            current = match (seg, current) {
                (Segment::Field(name), Value::Object(map)) => map.get(name)?,
                (Segment::Index(idx), Value::Array(items)) => items.get(*idx)?,
                (Segment::Wildcard, Value::Array(_)) => current,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Extract, cloning the resolved value, or `Value::Null` if
    /// missing (used where spec says "forwards null" on a soft miss).
    pub fn extract(&self, root: &Value) -> Value {
        self.resolve(root).cloned().unwrap_or(Value::Null)
    }

    /// Assign `value` at this path within `root`, creating any missing
    /// intermediate objects. Arrays are only indexed, never grown
    /// (workflow `result_path`/update expressions never need to append
    /// by index).
    pub fn assign(&self, root: &mut Value, value: Value) -> Result<()> {
        if self.segments.is_empty() {
            *root = value;
            return Ok(());
        }
        let mut current = root;
        for (i, seg) in self.segments.iter().enumerate() {
            let is_last = i == self.segments.len() - 1;
            match seg {
                Segment::Field(name) => {
                    if !current.is_object() {
                        *current = Value::Object(Map::new());
                    }
                    let map = current.as_object_mut().unwrap();
                    if is_last {
                        map.insert(name.clone(), value);
                        return Ok(());
                    }
                    current = map.entry(name.clone()).or_insert_with(|| Value::Object(Map::new()));
                }
                Segment::Index(idx) => {
                    if !current.is_array() {
                        *current = Value::Array(Vec::new());
                    }
                    let arr = current.as_array_mut().unwrap();
                    while arr.len() <= *idx {
                        arr.push(Value::Null);
                    }
                    if is_last {
                        arr[*idx] = value;
                        return Ok(());
                    }
                    current = &mut arr[*idx];
                }
                Segment::Wildcard => {
                    return Err(EmulatorError::InvalidArgument(
                        "wildcard segments are not assignable".into(),
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Convenience one-shot resolve without keeping the parsed `Path`
/// around. Returns `Value::Null` on a missing path, mirroring
/// `input_path`/`output_path` semantics when unset or non-matching.
pub fn extract(raw: &str, root: &Value) -> Result<Value> {
    Ok(Path::parse(raw)?.extract(root))
}

/// A context object used by the workflow engine for `$$` references
/// (e.g. `$$.Map.Item.Value`, `$$.Map.Item.Index`).
pub fn resolve_with_context(raw: &str, root: &Value, context: &Value) -> Result<Value> {
    let path = Path::parse(raw)?;
    if path.is_context {
        Ok(path.extract(context))
    } else {
        Ok(path.extract(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_field() {
        let root = json!({"a": {"b": 5}});
        assert_eq!(extract("$.a.b", &root).unwrap(), json!(5));
    }

    #[test]
    fn resolves_index() {
        let root = json!({"items": [10, 20, 30]});
        assert_eq!(extract("$.items[1]", &root).unwrap(), json!(20));
    }

    #[test]
    fn missing_path_is_null() {
        let root = json!({"a": 1});
        assert_eq!(extract("$.missing.deep", &root).unwrap(), Value::Null);
    }

    #[test]
    fn assigns_creating_intermediates() {
        let mut root = json!({});
        Path::parse("$.a.b").unwrap().assign(&mut root, json!(42)).unwrap();
        assert_eq!(root, json!({"a": {"b": 42}}));
    }

    #[test]
    fn context_root_is_separate() {
        let root = json!({"v": 1});
        let ctx = json!({"Map": {"Item": {"Index": 3}}});
        assert_eq!(
            resolve_with_context("$$.Map.Item.Index", &root, &ctx).unwrap(),
            json!(3)
        );
    }
}
