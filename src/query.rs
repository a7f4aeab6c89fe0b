//! The query engine: keyword pre-filter, closed-interval attribute ranges,
//! and the outcome envelope.
//!
//! A query never errors. Every call produces a [`QueryOutcome`] whose
//! [`OutcomeKind`] says exactly which stage of the pipeline stopped
//! producing matches, so a caller can phrase "the store is empty", "that
//! series does not exist", and "nothing in that wattage range" differently
//! without parsing message strings.
//!
//! Filtering never reorders: results come back in catalog order and `top_k`
//! is a prefix truncation, not a ranking.

use crate::catalog::CatalogStore;
use crate::record::ProductRecord;
use serde::{Deserialize, Serialize};

/// A closed interval `[lo, hi]` over one numeric attribute.
///
/// The default is the identity filter — every finite value passes. Bounds
/// are plain finite floats rather than infinities so a params struct
/// round-trips through JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeBound {
    pub lo: f64,
    pub hi: f64,
}

impl RangeBound {
    /// The identity filter: matches every value.
    pub fn open() -> Self {
        Self {
            lo: f64::MIN,
            hi: f64::MAX,
        }
    }

    /// A concrete closed interval.
    pub fn closed(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// Closed-interval membership, endpoints included.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value <= self.hi
    }
}

impl Default for RangeBound {
    fn default() -> Self {
        Self::open()
    }
}

/// One catalog query.
///
/// The keyword is split on whitespace; a record passes when ANY token is a
/// case-insensitive substring of its `series` or `model`. An empty keyword
/// skips the keyword stage entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub watt: RangeBound,
    #[serde(default)]
    pub cct: RangeBound,
    #[serde(default)]
    pub beam: RangeBound,
    #[serde(default)]
    pub lumen: RangeBound,
    #[serde(default)]
    pub price: RangeBound,
    /// Maximum number of records returned. Truncation keeps the first
    /// `top_k` matches in catalog order.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    50
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            watt: RangeBound::open(),
            cct: RangeBound::open(),
            beam: RangeBound::open(),
            lumen: RangeBound::open(),
            price: RangeBound::open(),
            top_k: default_top_k(),
        }
    }
}

/// Which stage of the query pipeline determined the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// At least one record matched; `items` is non-empty.
    Ok,
    /// The catalog holds no records; load or extract one first.
    NotLoaded,
    /// The keyword matched nothing, so the attribute filters never ran.
    SeriesNotFound,
    /// The keyword stage passed but every record fell outside a range.
    NoAttributeMatch,
}

/// The envelope every query returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    /// Convenience flag, `kind == Ok`.
    pub ok: bool,
    pub kind: OutcomeKind,
    /// Human-readable English summary of the outcome.
    pub message: String,
    /// The params that produced this outcome, echoed back.
    pub query: QueryParams,
    /// Number of records returned, always `items.len()`.
    pub total: usize,
    /// At most `top_k` records, in catalog order.
    pub items: Vec<ProductRecord>,
}

/// Run one query against the current catalog snapshot.
pub fn run_query(store: &CatalogStore, params: &QueryParams) -> QueryOutcome {
    let snapshot = store.snapshot();

    if snapshot.is_empty() {
        return QueryOutcome {
            ok: false,
            kind: OutcomeKind::NotLoaded,
            message: "No catalog is loaded. Extract or reload a catalog first.".into(),
            query: params.clone(),
            total: 0,
            items: Vec::new(),
        };
    }

    let tokens: Vec<String> = params
        .keyword
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();

    let keyword_matches: Vec<&ProductRecord> = if tokens.is_empty() {
        snapshot.iter().collect()
    } else {
        snapshot
            .iter()
            .filter(|r| matches_keyword(r, &tokens))
            .collect()
    };

    if !tokens.is_empty() && keyword_matches.is_empty() {
        return QueryOutcome {
            ok: false,
            kind: OutcomeKind::SeriesNotFound,
            message: format!(
                "No series or model matches '{}' in the loaded catalog.",
                params.keyword.trim()
            ),
            query: params.clone(),
            total: 0,
            items: Vec::new(),
        };
    }

    let matched: Vec<ProductRecord> = keyword_matches
        .into_iter()
        .filter(|r| matches_ranges(r, params))
        .cloned()
        .collect();

    if matched.is_empty() {
        return QueryOutcome {
            ok: false,
            kind: OutcomeKind::NoAttributeMatch,
            message: "Records matched the keyword, but none fall inside the requested attribute ranges.".into(),
            query: params.clone(),
            total: 0,
            items: Vec::new(),
        };
    }

    let matched_count = matched.len();
    let mut items = matched;
    items.truncate(params.top_k);
    let total = items.len();

    QueryOutcome {
        ok: true,
        kind: OutcomeKind::Ok,
        message: if matched_count > total {
            format!("{matched_count} records matched, returning the first {total}.")
        } else {
            format!("{total} matching records.")
        },
        query: params.clone(),
        total,
        items,
    }
}

/// Any token is a case-insensitive substring of series or model.
fn matches_keyword(record: &ProductRecord, tokens: &[String]) -> bool {
    let series = record.series.to_lowercase();
    let model = record.model.to_lowercase();
    tokens
        .iter()
        .any(|t| series.contains(t.as_str()) || model.contains(t.as_str()))
}

/// All five range checks, closed intervals; a by-quote price compares as 0.
fn matches_ranges(record: &ProductRecord, params: &QueryParams) -> bool {
    params.watt.contains(record.watt)
        && params.cct.contains(record.cct)
        && params.beam.contains(record.beam)
        && params.lumen.contains(record.lumen)
        && params.price.contains(record.price.range_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Price;

    fn store_with(records: Vec<ProductRecord>) -> CatalogStore {
        let store = CatalogStore::new();
        store.merge_from_batch(records);
        store
    }

    fn record(series: &str, model: &str, watt: f64, price: Price) -> ProductRecord {
        ProductRecord {
            series: series.to_string(),
            model: model.to_string(),
            watt,
            price,
            ..Default::default()
        }
    }

    fn sample_store() -> CatalogStore {
        store_with(vec![
            record("Orbit", "ORB-10", 10.0, Price::Amount(1200.0)),
            record("Orbit", "ORB-25", 25.0, Price::Amount(2400.0)),
            record("Linea", "LIN-40", 40.0, Price::ByQuote),
        ])
    }

    #[test]
    fn empty_store_is_not_loaded() {
        let outcome = run_query(&CatalogStore::new(), &QueryParams::default());
        assert!(!outcome.ok);
        assert_eq!(outcome.kind, OutcomeKind::NotLoaded);
    }

    #[test]
    fn empty_keyword_returns_whole_catalog() {
        let outcome = run_query(&sample_store(), &QueryParams::default());
        assert!(outcome.ok);
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.items.len(), 3);
    }

    #[test]
    fn keyword_matches_series_or_model_case_insensitively() {
        let store = sample_store();

        let by_series = run_query(
            &store,
            &QueryParams {
                keyword: "orbit".into(),
                ..Default::default()
            },
        );
        assert_eq!(by_series.total, 2);

        let by_model = run_query(
            &store,
            &QueryParams {
                keyword: "lin-40".into(),
                ..Default::default()
            },
        );
        assert_eq!(by_model.total, 1);
        assert_eq!(by_model.items[0].model, "LIN-40");
    }

    #[test]
    fn any_token_suffices() {
        let outcome = run_query(
            &sample_store(),
            &QueryParams {
                keyword: "nosuchthing linea".into(),
                ..Default::default()
            },
        );
        assert!(outcome.ok);
        assert_eq!(outcome.total, 1);
    }

    #[test]
    fn unmatched_keyword_is_series_not_found() {
        let outcome = run_query(
            &sample_store(),
            &QueryParams {
                keyword: "nebula".into(),
                watt: RangeBound::closed(0.0, 1.0),
                ..Default::default()
            },
        );
        // Keyword stage decides before attribute filters run.
        assert_eq!(outcome.kind, OutcomeKind::SeriesNotFound);
        assert!(outcome.items.is_empty());
    }

    #[test]
    fn range_misses_report_no_attribute_match() {
        let outcome = run_query(
            &sample_store(),
            &QueryParams {
                keyword: "orbit".into(),
                watt: RangeBound::closed(100.0, 200.0),
                ..Default::default()
            },
        );
        assert_eq!(outcome.kind, OutcomeKind::NoAttributeMatch);
    }

    #[test]
    fn range_endpoints_are_inclusive() {
        let outcome = run_query(
            &sample_store(),
            &QueryParams {
                watt: RangeBound::closed(10.0, 25.0),
                ..Default::default()
            },
        );
        assert_eq!(outcome.total, 2);
    }

    #[test]
    fn by_quote_price_compares_as_zero() {
        let store = sample_store();

        let zero_lo = run_query(
            &store,
            &QueryParams {
                price: RangeBound::closed(0.0, 100.0),
                ..Default::default()
            },
        );
        assert_eq!(zero_lo.total, 1);
        assert_eq!(zero_lo.items[0].model, "LIN-40");

        let positive_lo = run_query(
            &store,
            &QueryParams {
                price: RangeBound::closed(1.0, 100000.0),
                ..Default::default()
            },
        );
        assert!(zero_lo.ok);
        assert_eq!(positive_lo.total, 2);
    }

    #[test]
    fn top_k_is_a_prefix_in_catalog_order() {
        let outcome = run_query(
            &sample_store(),
            &QueryParams {
                top_k: 2,
                ..Default::default()
            },
        );
        // `total` counts returned records, not pre-truncation matches.
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.items[0].model, "ORB-10");
        assert_eq!(outcome.items[1].model, "ORB-25");
    }

    #[test]
    fn truncated_outcome_reports_returned_count_as_total() {
        let store = store_with(
            (1..=5)
                .map(|i| record("Orbit", &format!("ORB-{i}"), i as f64, Price::Amount(100.0)))
                .collect(),
        );
        let outcome = run_query(
            &store,
            &QueryParams {
                top_k: 2,
                ..Default::default()
            },
        );
        assert!(outcome.ok);
        assert_eq!(outcome.total, outcome.items.len());
        assert_eq!(outcome.total, 2);
        assert!(outcome.message.contains("5 records matched"));
    }

    #[test]
    fn outcome_envelope_serialises() {
        let outcome = run_query(&sample_store(), &QueryParams::default());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["kind"], "ok");
        assert_eq!(json["total"], 3);
    }
}
