//! Shared utilities: cache keys and time.

use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::registry::Params;

/// Separator between the resource name and its serialized parameters.
pub const KEY_SEPARATOR: char = ':';

/// Build the cache key for a resource and an optional parameter set.
///
/// Format: `{resource}` without params, `{resource}:{params}` with params,
/// where `{params}` is compact JSON with object keys sorted at every depth.
pub fn build_key(resource: &str, params: Option<&Params>) -> String {
    match params {
        None => resource.to_string(),
        Some(params) => {
            let canonical = canonicalize(&Value::Object(params.clone()));
            format!("{}{}{}", resource, KEY_SEPARATOR, canonical)
        }
    }
}

/// Whether `key` belongs to `resource`: the bare name or any parameterized key.
pub fn key_belongs_to(key: &str, resource: &str) -> bool {
    match key.strip_prefix(resource) {
        Some("") => true,
        Some(rest) => rest.starts_with(KEY_SEPARATOR),
        None => false,
    }
}

/// The resource part of a cache key.
pub fn resource_of(key: &str) -> &str {
    key.split(KEY_SEPARATOR).next().unwrap_or(key)
}

/// Rebuild a JSON value with object keys in sorted order.
///
/// Sorting is explicit so the result does not depend on whether serde_json
/// keeps insertion order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<_> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Get the current time in milliseconds since UNIX epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
