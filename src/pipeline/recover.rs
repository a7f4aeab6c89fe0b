//! Tolerant JSON recovery from free-form model output.
//!
//! ## Why is recovery necessary?
//!
//! Even well-prompted models wrap their JSON in prose, markdown fences, or a
//! trailing apology. Rather than demanding clean output, this module locates
//! the JSON inside the noise with a fixed three-stage fallback:
//!
//! 1. the first bracket-delimited pattern that looks like a JSON array of
//!    objects,
//! 2. failing that, a single JSON-object pattern,
//! 3. failing that, the whole output parsed directly.
//!
//! Nothing beyond these three attempts: malformed JSON is never repaired or
//! guessed at. Absence is an explicit `None`, so callers must decide what a
//! missing result means (here: one failed call in the retry loop).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static RE_ARRAY_OF_OBJECTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[\s*\{.*\}\s*\]").unwrap());

static RE_SINGLE_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?s)\{\s*".*\}"#).unwrap());

/// Recover a JSON value from raw model output, or `None`.
///
/// The located slice gets exactly one parse attempt; if it is malformed the
/// whole output is tried directly, and that is the last resort.
pub fn recover_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let located = RE_ARRAY_OF_OBJECTS
        .find(trimmed)
        .or_else(|| RE_SINGLE_OBJECT.find(trimmed));
    if let Some(m) = located {
        if let Ok(value) = serde_json::from_str::<Value>(m.as_str()) {
            return Some(value);
        }
    }

    serde_json::from_str::<Value>(trimmed).ok()
}

/// Recover a batch of candidate dicts from raw model output.
///
/// An object carrying an `items` array (some models obey "respond with JSON"
/// by wrapping the array) is unwrapped to that array; any other object is
/// treated as a single-element batch. A recovered scalar is not a batch and
/// counts as no result.
pub fn recover_candidates(raw: &str) -> Option<Vec<Value>> {
    match recover_json(raw)? {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => Some(items),
            Some(other) => {
                // Put a non-array `items` back; the object itself is the record.
                map.insert("items".into(), other);
                Some(vec![Value::Object(map)])
            }
            None => Some(vec![Value::Object(map)]),
        },
        _ => None,
    }
}
