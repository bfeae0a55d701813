//! Option mappings and layered merging.

use serde_json::{Map, Value};

/// Free-form option mapping (`string -> any JSON value`).
pub type Options = Map<String, Value>;

/// Builds instance options from module defaults and per-start overrides.
///
/// The result is an owned copy: defaults are never mutated and the returned
/// mapping shares nothing with either input. Overrides win key by key; the
/// merge is shallow, so nested objects are replaced rather than combined.
pub fn merge_options(defaults: &Options, overrides: Option<&Options>) -> Options {
    let mut merged = defaults.clone();
    if let Some(overrides) = overrides {
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Converts a JSON value into an option mapping.
///
/// Returns `None` when the value is not a JSON object.
pub fn options_from_value(value: Value) -> Option<Options> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
