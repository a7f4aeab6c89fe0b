//! Batch orchestration: drive a whole source through the pipeline and
//! report what happened.
//!
//! Units are processed strictly sequentially, in source order. A failed
//! unit (render error, retries exhausted, nothing recoverable) is counted
//! and logged, and the batch moves on — one smudged page must never cost
//! the other forty-nine. Only source-level problems (missing file, corrupt
//! PDF, empty folder) abort the batch.

use crate::config::ExtractionConfig;
use crate::error::{CatalogError, UnitError};
use crate::pipeline::source::{self, SourceUnit, UnitStream};
use crate::pipeline::{llm, normalize};
use crate::pipeline::llm::InferenceClient;
use crate::record::ProductRecord;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Everything a completed batch produced.
#[derive(Debug)]
pub struct BatchOutput {
    /// Validated records, in unit order.
    pub records: Vec<ProductRecord>,
    /// Per-unit accounting for the whole run.
    pub report: BatchReport,
}

/// Accounting for one extraction batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total_units: usize,
    pub success_units: usize,
    pub fail_units: usize,
    /// Validated records added across all units.
    pub records_added: usize,
    /// Candidates the normalization boundary rejected.
    pub dropped_candidates: usize,
    pub duration_ms: u64,
    pub units: Vec<UnitSummary>,
}

/// What happened to a single unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitSummary {
    pub index: usize,
    pub label: String,
    /// Validated records this unit contributed.
    pub records: usize,
    pub duration_ms: u64,
    /// Set when the unit failed; `records` is 0 in that case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<UnitError>,
}

/// Extract every page of a catalog PDF.
pub async fn extract_pdf(
    path: &Path,
    client: &dyn InferenceClient,
    config: &ExtractionConfig,
) -> Result<BatchOutput, CatalogError> {
    let stream = source::open_pdf(path, config).await?;
    run_batch(stream, client, config).await
}

/// Extract every page of a catalog PDF supplied as in-memory bytes.
///
/// The bytes are spooled to a temp file so the same validated file path
/// route is used; the file is removed when extraction finishes.
pub async fn extract_pdf_bytes(
    bytes: &[u8],
    client: &dyn InferenceClient,
    config: &ExtractionConfig,
) -> Result<BatchOutput, CatalogError> {
    let tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| CatalogError::Internal(format!("temp file creation failed: {e}")))?;
    std::fs::write(tmp.path(), bytes)
        .map_err(|e| CatalogError::Internal(format!("temp file write failed: {e}")))?;
    extract_pdf(tmp.path(), client, config).await
}

/// Extract every image in a folder of price screenshots, in sorted name
/// order. Pair with [`crate::config::PromptProfile::PriceTable`].
pub async fn extract_image_folder(
    path: &Path,
    client: &dyn InferenceClient,
    config: &ExtractionConfig,
) -> Result<BatchOutput, CatalogError> {
    let stream = source::open_image_folder(path).await?;
    run_batch(stream, client, config).await
}

/// The sequential unit loop shared by all sources.
async fn run_batch(
    mut stream: UnitStream,
    client: &dyn InferenceClient,
    config: &ExtractionConfig,
) -> Result<BatchOutput, CatalogError> {
    let total = stream.total();
    let batch_start = Instant::now();

    if let Some(cb) = &config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut records = Vec::new();
    let mut units = Vec::with_capacity(total);
    let mut success_units = 0usize;
    let mut dropped_candidates = 0usize;

    while let Some(item) = stream.next_unit().await {
        let unit_start = Instant::now();
        match item {
            Ok(unit) => {
                if let Some(cb) = &config.progress_callback {
                    cb.on_unit_start(unit.index, total, &unit.label);
                }

                match process_unit(&unit, client, config).await {
                    Ok((mut unit_records, dropped)) => {
                        success_units += 1;
                        dropped_candidates += dropped;
                        let added = unit_records.len();
                        info!(
                            "Unit {}/{} ({}): {} records ({} candidates dropped)",
                            unit.index, total, unit.label, added, dropped
                        );
                        if let Some(cb) = &config.progress_callback {
                            cb.on_unit_complete(unit.index, total, added);
                        }
                        records.append(&mut unit_records);
                        units.push(UnitSummary {
                            index: unit.index,
                            label: unit.label,
                            records: added,
                            duration_ms: unit_start.elapsed().as_millis() as u64,
                            error: None,
                        });
                    }
                    Err(err) => {
                        warn!("Unit {}/{} ({}): {err}", unit.index, total, unit.label);
                        if let Some(cb) = &config.progress_callback {
                            cb.on_unit_error(unit.index, total, &err.to_string());
                        }
                        units.push(UnitSummary {
                            index: unit.index,
                            label: unit.label,
                            records: 0,
                            duration_ms: unit_start.elapsed().as_millis() as u64,
                            error: Some(err),
                        });
                    }
                }
            }
            Err(err) => {
                // The source itself could not produce this unit.
                let index = match &err {
                    UnitError::Render { unit, .. } | UnitError::Extraction { unit, .. } => *unit,
                };
                warn!("Unit {index}/{total}: {err}");
                if let Some(cb) = &config.progress_callback {
                    cb.on_unit_error(index, total, &err.to_string());
                }
                units.push(UnitSummary {
                    index,
                    label: format!("unit {index}"),
                    records: 0,
                    duration_ms: unit_start.elapsed().as_millis() as u64,
                    error: Some(err),
                });
            }
        }
    }

    if let Some(cb) = &config.progress_callback {
        cb.on_batch_complete(total, success_units);
    }

    let report = BatchReport {
        total_units: total,
        success_units,
        fail_units: total - success_units,
        records_added: records.len(),
        dropped_candidates,
        duration_ms: batch_start.elapsed().as_millis() as u64,
        units,
    };

    info!(
        "Batch complete: {}/{} units, {} records, {} candidates dropped, {} ms",
        report.success_units,
        report.total_units,
        report.records_added,
        report.dropped_candidates,
        report.duration_ms
    );

    Ok(BatchOutput { records, report })
}

/// One unit: inference then normalization.
///
/// A unit succeeds when inference recovers at least one candidate, even if
/// normalization subsequently drops some (or all) of them — the drops are
/// data-quality noise, not unit failure.
async fn process_unit(
    unit: &SourceUnit,
    client: &dyn InferenceClient,
    config: &ExtractionConfig,
) -> Result<(Vec<ProductRecord>, usize), UnitError> {
    let candidates = llm::extract_unit(client, unit, config).await?;
    Ok(normalize::normalize_batch(&candidates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::pipeline::llm::{InferenceCallError, InferenceRequest};
    use async_trait::async_trait;
    use image::DynamicImage;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedClient {
        replies: Mutex<VecDeque<String>>,
        vision_calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                vision_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl InferenceClient for ScriptedClient {
        async fn complete(&self, request: InferenceRequest) -> Result<String, InferenceCallError> {
            if request.image.is_some() {
                self.vision_calls.fetch_add(1, Ordering::SeqCst);
            }
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted client ran out of replies"))
        }
    }

    fn unit(index: usize, text: &str) -> SourceUnit {
        SourceUnit {
            index,
            label: format!("page {index}"),
            text: text.to_string(),
            image: DynamicImage::new_rgb8(8, 8),
        }
    }

    #[tokio::test]
    async fn mixed_grounding_batch_reports_every_unit_successful() {
        // Unit 1 carries a text layer and is answered on the text attempt;
        // unit 2 has none, so its only call is vision-grounded.
        let client = ScriptedClient::new(&[
            r#"[{"model":"ORB-10","watt":10,"price":1200}]"#,
            r#"[{"model":"ORB-25","watt":25,"price":2400}]"#,
        ]);
        let config = ExtractionConfig::builder()
            .retry(RetryPolicy::none())
            .build()
            .unwrap();

        let stream = UnitStream::from_units(vec![
            Ok(unit(1, "ORB-10 10W 3000K NT$1,200")),
            Ok(unit(2, "")),
        ]);
        let output = run_batch(stream, &client, &config).await.unwrap();

        assert_eq!(output.report.total_units, 2);
        assert_eq!(output.report.success_units, 2);
        assert_eq!(output.report.fail_units, 0);
        assert_eq!(output.report.records_added, 2);
        assert!(output.report.units.iter().all(|u| u.error.is_none()));
        assert_eq!(client.vision_calls.load(Ordering::SeqCst), 1);
        assert!(client.replies.lock().unwrap().is_empty());
    }
}
