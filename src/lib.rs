//! # lumispec
//!
//! Extract structured lighting-product data from PDF catalogs and price
//! screenshots using Vision Language Models (VLMs), and query the result.
//!
//! ## Why this crate?
//!
//! Lighting catalogs are design-heavy PDFs: spec tables set in tiny type,
//! multi-column layouts, product photos with callouts. Conventional PDF
//! table extractors produce garbage on them. Instead this crate hands each
//! page to a VLM — text layer first when one exists, rendered image as
//! fallback — and coerces whatever comes back into a fixed nine-field
//! product record. The resulting catalog is an ordered JSON array that can
//! be persisted, reloaded, and queried by keyword and attribute ranges.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image folder
//!  │
//!  ├─ 1. Source     stream pages or images lazily (pdfium, spawn_blocking)
//!  ├─ 2. Inference  text-grounded call, vision fallback, retry/backoff
//!  ├─ 3. Recover    tolerant JSON recovery from free-form model output
//!  ├─ 4. Normalize  coerce candidates into validated ProductRecords
//!  └─ 5. Catalog    append to the store; persist / reload / query
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lumispec::{
//!     extract_pdf, run_query, CatalogStore, ExtractionConfig, ProviderClient,
//!     QueryParams, RangeBound,
//! };
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ExtractionConfig::default();
//!     let client = ProviderClient::resolve(&config)?;
//!
//!     let output = extract_pdf(Path::new("catalog.pdf"), &client, &config).await?;
//!     eprintln!(
//!         "{}/{} pages, {} records",
//!         output.report.success_units, output.report.total_units,
//!         output.report.records_added
//!     );
//!
//!     let store = CatalogStore::new();
//!     store.merge_from_batch(output.records);
//!     store.persist(Path::new("catalog.json"))?;
//!
//!     let outcome = run_query(
//!         &store,
//!         &QueryParams {
//!             keyword: "軌道燈".into(),
//!             watt: RangeBound::closed(10.0, 30.0),
//!             ..Default::default()
//!         },
//!     );
//!     println!("{}", serde_json::to_string_pretty(&outcome)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `lumispec` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! lumispec = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod query;
pub mod record;
pub mod series;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use catalog::{CatalogStatus, CatalogStore};
pub use config::{
    Backoff, ExtractionConfig, ExtractionConfigBuilder, PromptProfile, RetryPolicy,
};
pub use error::{CatalogError, UnitError};
pub use extract::{
    extract_image_folder, extract_pdf, extract_pdf_bytes, BatchOutput, BatchReport, UnitSummary,
};
pub use pipeline::llm::{
    classify_keyword, InferenceCallError, InferenceClient, InferenceRequest, KeywordKind,
    ProviderClient,
};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use query::{run_query, OutcomeKind, QueryOutcome, QueryParams, RangeBound};
pub use record::{Price, ProductRecord, TIME_PRICE_MARKER};
pub use series::{load_series_map, SeriesMap};
