//! Canonical preference value serialization
//!
//! Renders a preference value to the exact byte string Chromium's preference
//! hashing feeds into the HMAC. The rules are not plain JSON: null and empty
//! arrays get special forms, object keys are sorted, and object entries that
//! hold empty containers are dropped before rendering.

use serde_json::{Map, Value};

/// Serialize a preference value to its canonical hashed form.
///
/// - Null (and an absent preference) renders as the empty string.
/// - Booleans render as `true` / `false`.
/// - An empty array renders as `[]`.
/// - Non-empty arrays and objects render as compact JSON of the
///   canonicalized value.
/// - Strings are JSON-quoted, non-ASCII kept literal.
/// - Numbers use the shortest round-trip decimal form.
///
/// Pure and total: every value in the closed union has exactly one rendering.
pub fn serialize_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(_) => value.to_string(),
        Value::Array(items) if items.is_empty() => "[]".to_string(),
        Value::Array(_) | Value::Object(_) => canonicalize(value).to_string(),
    }
}

/// Rebuild a value with object keys in lexicographic order and object entries
/// whose value canonicalizes to an empty object or array removed. Array items
/// are never pruned, only canonicalized.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let mut out = Map::new();
            for key in keys {
                let item = canonicalize(&map[key]);
                match &item {
                    Value::Object(inner) if inner.is_empty() => continue,
                    Value::Array(inner) if inner.is_empty() => continue,
                    _ => {}
                }
                out.insert(key.clone(), item);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
