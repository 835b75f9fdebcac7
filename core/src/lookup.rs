//! Dot-path access into JSON values.
//!
//! Shared by the rule engine (`event.actor_name`) and the template renderer
//! (`[[[event.bits]]]`). Lookups never fail: a missing intermediate key simply
//! resolves to `None`, and callers pick their own default.

use serde_json::Value;

/// Walk `path` (dot separated) through nested objects and arrays.
///
/// Numeric segments index into arrays. An empty path returns the root.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Resolve a tag name against render/rule data.
///
/// A flat key containing dots (`"a.b"`) wins over nested traversal, so flat
/// overlay state and nested event objects can live in one data object.
pub fn resolve<'a>(data: &'a Value, name: &str) -> Option<&'a Value> {
    if let Some(value) = data.as_object().and_then(|map| map.get(name)) {
        return Some(value);
    }
    get_path(data, name)
}

/// Resolve and stringify, falling back to `default` for missing or null values.
pub fn get_path_or(root: &Value, path: &str, default: &str) -> String {
    resolve(root, path)
        .and_then(value_to_string)
        .unwrap_or_else(|| default.to_string())
}

/// String form of a JSON value as templates and overlay state see it.
///
/// `null` has no string form; containers render as compact JSON.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Write a number the way overlay state stores it (`3`, not `3.0`).
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Parse an overlay/event value as a number. Empty strings are not numbers.
pub fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}
