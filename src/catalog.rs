//! The catalog store: the ordered product-record sequence behind
//! snapshot-and-swap.
//!
//! ## Concurrency contract
//!
//! Readers call [`CatalogStore::snapshot`] and get an `Arc` to an immutable
//! vector — cheap, lock-free after the clone, and never a partially-replaced
//! catalog. Writers (`reload`, `merge_from_batch`) build the complete next
//! vector first and swap it in under the write lock. The two writers are
//! single-writer by contract: extraction batches and reloads do not overlap.
//!
//! ## Reload failure semantics
//!
//! A failed reload — missing file, invalid JSON, top level not an array —
//! leaves the in-memory catalog exactly as it was. The swap happens only
//! after the whole file has parsed, so this property holds by construction.

use crate::error::CatalogError;
use crate::record::ProductRecord;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Process-wide ordered sequence of product records.
///
/// Insertion order is preserved through every operation; nothing here ever
/// re-sorts the catalog.
pub struct CatalogStore {
    records: RwLock<Arc<Vec<ProductRecord>>>,
}

/// Load state and size, for reporting to any caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogStatus {
    /// True once the catalog holds at least one record.
    pub loaded: bool,
    /// Number of records currently in the catalog.
    pub count: usize,
}

impl CatalogStore {
    /// An empty store. Populate via [`reload`](Self::reload) or
    /// [`merge_from_batch`](Self::merge_from_batch).
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// An immutable snapshot of the current catalog.
    pub fn snapshot(&self) -> Arc<Vec<ProductRecord>> {
        Arc::clone(
            &self
                .records
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Replace the catalog wholesale from a persisted JSON file.
    ///
    /// The top level must be an array. Entries that are not objects are
    /// skipped silently (counted in a debug log). On any read or parse
    /// failure the previous catalog is untouched and the error describes
    /// what went wrong.
    ///
    /// Returns the number of records loaded.
    pub fn reload(&self, path: &Path) -> Result<usize, CatalogError> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CatalogError::SourceNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => CatalogError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => CatalogError::FormatError {
                path: path.to_path_buf(),
                detail: e.to_string(),
            },
        })?;

        let value: Value =
            serde_json::from_slice(&bytes).map_err(|e| CatalogError::FormatError {
                path: path.to_path_buf(),
                detail: format!("invalid JSON: {e}"),
            })?;

        let Value::Array(entries) = value else {
            return Err(CatalogError::FormatError {
                path: path.to_path_buf(),
                detail: format!("top level is {}, expected an array", json_type_name(&value)),
            });
        };

        let mut records = Vec::with_capacity(entries.len());
        let mut skipped = 0usize;
        for entry in entries {
            if !entry.is_object() {
                skipped += 1;
                continue;
            }
            match serde_json::from_value::<ProductRecord>(entry) {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    debug!("reload: skipping malformed entry: {e}");
                }
            }
        }
        if skipped > 0 {
            debug!("reload: skipped {skipped} non-record entries");
        }

        let count = records.len();
        let mut guard = self.records.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(records);
        drop(guard);

        info!("catalog reloaded from '{}': {count} records", path.display());
        Ok(count)
    }

    /// Append normalized records from a completed extraction batch.
    ///
    /// No deduplication: repeated extraction of the same unit can produce
    /// duplicate model entries, and that is accepted behaviour.
    ///
    /// Returns the number of records appended.
    pub fn merge_from_batch(&self, records: Vec<ProductRecord>) -> usize {
        let appended = records.len();
        if appended == 0 {
            return 0;
        }

        let mut guard = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = (**guard).clone();
        next.extend(records);
        let total = next.len();
        *guard = Arc::new(next);
        drop(guard);

        info!("catalog merge: +{appended} records, {total} total");
        appended
    }

    /// Serialize the full ordered sequence as a pretty-printed JSON array.
    ///
    /// Atomic write: temp file in the target directory, then rename, so a
    /// crash mid-write never leaves a truncated catalog on disk.
    ///
    /// Returns the number of records written.
    pub fn persist(&self, path: &Path) -> Result<usize, CatalogError> {
        let snapshot = self.snapshot();
        let mut json = serde_json::to_string_pretty(&*snapshot)
            .map_err(|e| CatalogError::Internal(format!("catalog serialisation failed: {e}")))?;
        json.push('\n');

        let write_err = |source: std::io::Error| CatalogError::PersistFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(write_err)?;
        std::fs::rename(&tmp_path, path).map_err(write_err)?;

        info!("catalog persisted to '{}': {} records", path.display(), snapshot.len());
        Ok(snapshot.len())
    }

    /// Whether the catalog is loaded, and how many records it holds.
    pub fn status(&self) -> CatalogStatus {
        let snapshot = self.snapshot();
        CatalogStatus {
            loaded: !snapshot.is_empty(),
            count: snapshot.len(),
        }
    }
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Price;

    fn record(model: &str, price: f64) -> ProductRecord {
        ProductRecord {
            model: model.to_string(),
            price: Price::Amount(price),
            ..Default::default()
        }
    }

    #[test]
    fn empty_store_reports_not_loaded() {
        let store = CatalogStore::new();
        assert_eq!(store.status(), CatalogStatus { loaded: false, count: 0 });
    }

    #[test]
    fn merge_appends_in_order_without_dedup() {
        let store = CatalogStore::new();
        store.merge_from_batch(vec![record("A-1", 100.0), record("B-2", 200.0)]);
        store.merge_from_batch(vec![record("A-1", 100.0)]);

        let snapshot = store.snapshot();
        let models: Vec<&str> = snapshot.iter().map(|r| r.model.as_str()).collect();
        assert_eq!(models, ["A-1", "B-2", "A-1"]);
    }

    #[test]
    fn persist_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let store = CatalogStore::new();
        store.merge_from_batch(vec![record("A-1", 100.0), record("B-2", 200.0)]);
        assert_eq!(store.persist(&path).unwrap(), 2);

        let reloaded = CatalogStore::new();
        assert_eq!(reloaded.reload(&path).unwrap(), 2);
        assert_eq!(*reloaded.snapshot(), *store.snapshot());
        // No stray temp file after the atomic rename.
        assert!(!dir.path().join("catalog.json.tmp").exists());
    }

    #[test]
    fn reload_skips_non_object_entries_silently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"model":"A-1","price":100}, "stray string", 42, {"model":"B-2","price":200}]"#,
        )
        .unwrap();

        let store = CatalogStore::new();
        assert_eq!(store.reload(&path).unwrap(), 2);
    }

    #[test]
    fn failed_reload_preserves_previous_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new();
        store.merge_from_batch(vec![record("A-1", 100.0)]);

        // Top level is an object, not an array.
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"items": []}"#).unwrap();
        let err = store.reload(&bad).unwrap_err();
        assert!(matches!(err, CatalogError::FormatError { .. }));
        assert_eq!(store.status().count, 1);

        // Unreadable file.
        let missing = dir.path().join("missing.json");
        let err = store.reload(&missing).unwrap_err();
        assert!(matches!(err, CatalogError::SourceNotFound { .. }));
        assert_eq!(store.status().count, 1);

        // Invalid JSON.
        let garbled = dir.path().join("garbled.json");
        std::fs::write(&garbled, "[{").unwrap();
        assert!(store.reload(&garbled).is_err());
        assert_eq!(store.snapshot()[0].model, "A-1");
    }

    #[test]
    fn reload_replaces_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, r#"[{"model":"NEW-1","price":50}]"#).unwrap();

        let store = CatalogStore::new();
        store.merge_from_batch(vec![record("OLD-1", 100.0), record("OLD-2", 200.0)]);
        store.reload(&path).unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].model, "NEW-1");
    }
}
