//! Field coercion and validation for raw candidate dicts.
//!
//! This is the single boundary where loosely-shaped model output becomes a
//! typed [`ProductRecord`]. Everything downstream of this module can rely on
//! the catalog invariant: non-empty canonical model code, price either a
//! positive amount or the time-price sentinel.
//!
//! Two rules are deliberately lossy and must not be "fixed" silently:
//!
//! * Numeric coercion takes the first numeric token found anywhere in the
//!   string form and defaults to `0.0`. A record with a garbled wattage is
//!   more useful than no record.
//! * Model canonicalization substitutes confusable characters (full-width
//!   digits → ASCII, letter I → digit 1, letter O → digit 0). This is
//!   irreversible and corrupts legitimate alphabetic codes containing "O"
//!   or "I" — e.g. "ORB-10" becomes "0RB-10". It exists because OCR-style
//!   misreads of digits are far more common in this corpus than O/I-bearing
//!   codes. Changing the substitution table is a product decision on code
//!   format rules, not a refactor.

use crate::record::{lossy_number, Price, ProductRecord};
use serde_json::Value;
use tracing::debug;

/// Keys consumed by the fixed schema; everything else lands in `extra`.
const SCHEMA_KEYS: &[&str] = &[
    "series", "model", "watt", "cct", "beam", "lumen", "price", "voltage", "cri", "ip",
];

/// Normalize one raw candidate dict into a validated record.
///
/// Returns `None` (the candidate is dropped) when the value is not an
/// object, the model code is empty after canonicalization, or the price is
/// neither a positive number nor a recognised time-price phrase. Drops are
/// silent by contract — observable only as a smaller output count.
pub fn normalize_candidate(raw: &Value) -> Option<ProductRecord> {
    let obj = raw.as_object()?;

    let model = canonicalize_model(&stringy(obj.get("model")));
    if model.is_empty() {
        debug!("dropping candidate: empty model after canonicalization");
        return None;
    }

    let raw_price = stringy(obj.get("price"));
    let price = match Price::from_raw_text(&raw_price) {
        Some(p) => p,
        None => {
            debug!(model = %model, raw_price = %raw_price, "dropping candidate: unusable price");
            return None;
        }
    };

    let mut extra = serde_json::Map::new();
    for (key, value) in obj {
        if !SCHEMA_KEYS.contains(&key.as_str()) {
            extra.insert(key.clone(), value.clone());
        }
    }

    Some(ProductRecord {
        series: stringy(obj.get("series")),
        model,
        watt: coerce_number(obj.get("watt")),
        cct: coerce_number(obj.get("cct")),
        beam: coerce_number(obj.get("beam")),
        lumen: coerce_number(obj.get("lumen")),
        price,
        voltage: stringy(obj.get("voltage")),
        cri: stringy(obj.get("cri")),
        ip: stringy(obj.get("ip")),
        extra,
    })
}

/// Normalize a whole candidate batch. Returns the surviving records and the
/// number of dropped candidates.
pub fn normalize_batch(candidates: &[Value]) -> (Vec<ProductRecord>, usize) {
    let mut records = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if let Some(record) = normalize_candidate(candidate) {
            records.push(record);
        }
    }
    let dropped = candidates.len() - records.len();
    (records, dropped)
}

/// Canonicalize a model code: strip all whitespace, uppercase, substitute
/// confusable characters. Idempotent.
pub fn canonicalize_model(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_whitespace() {
            continue;
        }
        for upper in ch.to_uppercase() {
            out.push(substitute_confusable(upper));
        }
    }
    out
}

/// The fixed confusable-substitution table.
fn substitute_confusable(ch: char) -> char {
    match ch {
        // Full-width digits → ASCII.
        '０'..='９' => char::from_u32('0' as u32 + (ch as u32 - '０' as u32)).unwrap_or(ch),
        // Misread letters → the digit they were misread from.
        'Ｉ' | 'I' => '1',
        'Ｏ' | 'O' => '0',
        _ => ch,
    }
}

/// Lossy numeric coercion over any JSON value. Never fails, only defaults.
fn coerce_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => lossy_number(s).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Scalar JSON values stringified; strings pass through untouched.
fn stringy(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonicalization_applies_confusable_table() {
        assert_eq!(canonicalize_model(" led-１０i "), "LED-101");
        assert_eq!(canonicalize_model("od５０"), "0D50");
        assert_eq!(canonicalize_model("T5 BA1"), "T5BA1");
    }

    #[test]
    fn canonicalization_is_idempotent() {
        for raw in ["orb-10w", "ＬＥＤ-３６", "d-fxtr7n", "OI10"] {
            let once = canonicalize_model(raw);
            assert_eq!(canonicalize_model(&once), once, "not idempotent for {raw}");
        }
    }

    #[test]
    fn candidate_with_numeric_price_survives() {
        let record = normalize_candidate(&json!({
            "model": "led-36", "series": "軌道", "watt": "36W",
            "cct": 4000, "price": "1,500", "ip": "IP40"
        }))
        .unwrap();
        assert_eq!(record.model, "LED-36");
        assert_eq!(record.watt, 36.0);
        assert_eq!(record.price, Price::Amount(1500.0));
        assert_eq!(record.ip, "IP40");
    }

    #[test]
    fn time_price_phrase_beats_numeric_fragment() {
        let record = normalize_candidate(&json!({
            "model": "A-1", "price": "原價 2,000，現在時價"
        }))
        .unwrap();
        assert_eq!(record.price, Price::ByQuote);
    }

    #[test]
    fn drops_empty_model_and_unusable_price() {
        assert!(normalize_candidate(&json!({"model": "  ", "price": 100})).is_none());
        assert!(normalize_candidate(&json!({"model": "A-1", "price": 0})).is_none());
        assert!(normalize_candidate(&json!({"model": "A-1", "price": -5})).is_none());
        assert!(normalize_candidate(&json!({"model": "A-1"})).is_none());
        assert!(normalize_candidate(&json!("not an object")).is_none());
    }

    #[test]
    fn unparseable_numerics_default_to_zero() {
        let record = normalize_candidate(&json!({
            "model": "A-1", "price": 100, "watt": "n/a", "lumen": {}
        }))
        .unwrap();
        assert_eq!(record.watt, 0.0);
        assert_eq!(record.lumen, 0.0);
    }

    #[test]
    fn unknown_keys_are_preserved_in_extra() {
        let record = normalize_candidate(&json!({
            "model": "A-1", "price": 100, "price_from": "2024 list"
        }))
        .unwrap();
        assert_eq!(record.extra["price_from"], "2024 list");
    }

    #[test]
    fn batch_counts_drops() {
        let candidates = vec![
            json!({"model": "A-1", "price": 100}),
            json!({"model": "", "price": 100}),
            json!({"model": "B-2", "price": "時價"}),
        ];
        let (records, dropped) = normalize_batch(&candidates);
        assert_eq!(records.len(), 2);
        assert_eq!(dropped, 1);
    }
}
