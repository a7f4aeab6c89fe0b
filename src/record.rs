//! The catalog data model: [`ProductRecord`] and its [`Price`] field.
//!
//! ## Why tolerant deserialization?
//!
//! Persisted catalogs get hand-edited, and candidate dicts come straight out
//! of a language model: `watt` may arrive as `10`, `"10W"`, or `"10,000"`,
//! and `price` as `1999`, `"1,999"`, or `"時價"`. The field-level coercion
//! rules live here, next to the types they produce, so a record parsed from
//! any of those spellings lands in exactly one canonical shape. Coercion is
//! lossy by design — a numeric field with no digit anywhere becomes `0.0`,
//! never an error.
//!
//! Unknown fields on a record are captured in `extra` and written back
//! verbatim on persist, so a reload → persist round-trip never destroys
//! annotations added by other tools.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// The marker string persisted for a non-numeric "inquire for price" value.
///
/// Distinct from a dropped record: a record priced [`Price::ByQuote`] is a
/// real catalog entry whose price is simply not published.
pub const TIME_PRICE_MARKER: &str = "時價";

/// Phrases (case-insensitive) that classify a raw price as [`Price::ByQuote`].
pub const TIME_PRICE_PHRASES: &[&str] =
    &["時價", "面議", "洽詢", "電洽", "tba", "inquire", "call for price"];

/// One catalog entry.
///
/// Invariant for persisted/queryable catalogs: `model` is non-empty and
/// `price` is either a positive amount or the time-price sentinel. The
/// [`crate::pipeline::normalize`] boundary enforces this exactly once;
/// everything downstream can rely on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Grouping label, may be empty.
    #[serde(default, deserialize_with = "de_stringy")]
    pub series: String,
    /// Canonical model code.
    #[serde(default, deserialize_with = "de_stringy")]
    pub model: String,
    /// Power in watts; `0.0` when the source value was unparseable.
    #[serde(default, deserialize_with = "de_lossy_number")]
    pub watt: f64,
    /// Colour temperature in kelvin; `0.0` when unparseable.
    #[serde(default, deserialize_with = "de_lossy_number")]
    pub cct: f64,
    /// Beam angle in degrees; `0.0` when unparseable.
    #[serde(default, deserialize_with = "de_lossy_number")]
    pub beam: f64,
    /// Luminous flux in lumen; `0.0` when unparseable.
    #[serde(default, deserialize_with = "de_lossy_number")]
    pub lumen: f64,
    /// List price, or the time-price sentinel.
    #[serde(default)]
    pub price: Price,
    /// Passed through unmodified.
    #[serde(default, deserialize_with = "de_stringy")]
    pub voltage: String,
    /// Passed through unmodified.
    #[serde(default, deserialize_with = "de_stringy")]
    pub cri: String,
    /// Passed through unmodified.
    #[serde(default, deserialize_with = "de_stringy")]
    pub ip: String,
    /// Unknown fields, preserved verbatim through reload → persist.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for ProductRecord {
    fn default() -> Self {
        Self {
            series: String::new(),
            model: String::new(),
            watt: 0.0,
            cct: 0.0,
            beam: 0.0,
            lumen: 0.0,
            price: Price::default(),
            voltage: String::new(),
            cri: String::new(),
            ip: String::new(),
            extra: serde_json::Map::new(),
        }
    }
}

impl ProductRecord {
    /// Whether the record satisfies the catalog invariant: non-empty model
    /// and a valid price (positive amount or sentinel).
    pub fn is_valid(&self) -> bool {
        !self.model.is_empty()
            && match self.price {
                Price::Amount(v) => v > 0.0,
                Price::ByQuote => true,
            }
    }
}

// ── Price ────────────────────────────────────────────────────────────────

/// A list price: either a numeric amount or the time-price sentinel.
///
/// Serialised as a bare number or the marker string `"時價"`, matching the
/// persisted catalog format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Price {
    /// A concrete price. Valid records carry a value `> 0`.
    Amount(f64),
    /// "Inquire for price" — no numeric value published.
    ByQuote,
}

impl Default for Price {
    fn default() -> Self {
        Price::Amount(0.0)
    }
}

impl Price {
    /// Classify a raw price string.
    ///
    /// The sentinel phrase check wins over any numeric fragment in the same
    /// string ("約 2,000 / 時價" is still by-quote). Returns `None` when the
    /// text is neither a sentinel nor a positive number — the caller drops
    /// the record.
    pub fn from_raw_text(raw: &str) -> Option<Price> {
        if is_time_price_phrase(raw) {
            return Some(Price::ByQuote);
        }
        match lossy_number(raw) {
            Some(v) if v > 0.0 => Some(Price::Amount(v)),
            _ => None,
        }
    }

    /// The value used in closed-interval range checks.
    ///
    /// A by-quote price compares as literal `0.0`. This means a query with a
    /// lower price bound of zero includes time-price records and any positive
    /// lower bound excludes them — intentional, documented behaviour.
    pub fn range_value(&self) -> f64 {
        match self {
            Price::Amount(v) => *v,
            Price::ByQuote => 0.0,
        }
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Price::Amount(v) => serializer.serialize_f64(*v),
            Price::ByQuote => serializer.serialize_str(TIME_PRICE_MARKER),
        }
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::Number(n) => Price::Amount(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => {
                if is_time_price_phrase(&s) {
                    Price::ByQuote
                } else {
                    Price::Amount(lossy_number(&s).unwrap_or(0.0))
                }
            }
            _ => Price::Amount(0.0),
        })
    }
}

/// True when the text contains any recognised non-numeric-price phrase.
pub fn is_time_price_phrase(raw: &str) -> bool {
    let lowered = raw.to_lowercase();
    TIME_PRICE_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

// ── Lossy numeric coercion ───────────────────────────────────────────────

static RE_NUMERIC_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?\d+(?:\.\d+)?").unwrap());

/// Extract the first numeric token found anywhere in the string, after
/// stripping thousands separators. `"10,500 lm"` → `10500.0`.
pub fn lossy_number(raw: &str) -> Option<f64> {
    let stripped = raw.replace(',', "");
    RE_NUMERIC_TOKEN
        .find(&stripped)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

// ── Field-level deserializers ────────────────────────────────────────────

/// Numeric field: accepts a JSON number or any string, coercing via
/// [`lossy_number`] with a `0.0` default. Never fails.
fn de_lossy_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => lossy_number(&s).unwrap_or(0.0),
        _ => 0.0,
    })
}

/// String field: scalar JSON values are stringified, content untouched.
fn de_stringy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
