//! Error types for the lumispec library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CatalogError`] — **Fatal**: the operation cannot proceed at all
//!   (missing source, malformed catalog file, provider not configured).
//!   Returned as `Err(CatalogError)` from the top-level entry points.
//!
//! * [`UnitError`] — **Non-fatal**: a single page or image failed (render
//!   glitch, both extraction groundings exhausted) but every other unit is
//!   fine. Stored inside [`crate::extract::UnitSummary`] so callers can
//!   inspect partial success rather than losing the whole batch to one bad
//!   unit.
//!
//! Query misses ("catalog not loaded", "series not found") are deliberately
//! *not* errors — they are ordinary outcomes reported through
//! [`crate::query::QueryOutcome`] so UI and API callers never have to catch
//! anything on the read path.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the lumispec library.
///
/// Unit-level failures use [`UnitError`] and are counted in
/// [`crate::extract::BatchReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum CatalogError {
    // ── Source errors ─────────────────────────────────────────────────────
    /// Input file or folder was not found at the given path.
    #[error("Source not found: '{path}'\nCheck the path exists and is readable.")]
    SourceNotFound { path: PathBuf },

    /// Process does not have read permission on the source.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// An image folder contained no files matching the extension allow-list.
    #[error("Folder '{path}' contains no png/jpg/jpeg/webp images")]
    EmptyFolder { path: PathBuf },

    // ── Catalog errors ────────────────────────────────────────────────────
    /// A persisted catalog file could not be parsed as a JSON array.
    ///
    /// The in-memory catalog is left exactly as it was before the reload
    /// attempt — callers never observe a half-loaded state.
    #[error("Catalog file '{path}' is malformed: {detail}\nThe top level must be a JSON array of product records. The previous catalog is unchanged.")]
    FormatError { path: PathBuf, detail: String },

    /// Could not create or write the persisted catalog file.
    #[error("Failed to write catalog file '{path}': {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Spreadsheet errors ────────────────────────────────────────────────
    /// The xlsx source is missing the expected model/name columns.
    #[error("Spreadsheet '{path}' is not usable: {detail}\nA model-code column (型號 / Product Code / Model) and a display-name column (品名 / 名稱 / Name) are required.")]
    SpreadsheetFormat { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single extraction unit.
///
/// Stored alongside [`crate::extract::UnitSummary`] when a unit fails.
/// The overall batch always continues to the next unit.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// Rasterisation, decode, or JPEG re-encode failed for this unit.
    #[error("Unit {unit}: render failed: {detail}")]
    Render { unit: usize, detail: String },

    /// Both the text-grounded and vision-grounded attempts exhausted their
    /// retries without producing any candidate records.
    #[error("Unit {unit}: extraction failed after {retries} retries per grounding: {detail}")]
    Extraction {
        unit: usize,
        retries: u32,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_mentions_prior_state() {
        let e = CatalogError::FormatError {
            path: PathBuf::from("data/catalog.json"),
            detail: "top level is an object".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("catalog.json"), "got: {msg}");
        assert!(msg.contains("previous catalog is unchanged"), "got: {msg}");
    }

    #[test]
    fn extraction_error_display() {
        let e = UnitError::Extraction {
            unit: 7,
            retries: 2,
            detail: "no JSON in model output".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Unit 7"));
        assert!(msg.contains("2 retries"));
    }

    #[test]
    fn unit_error_round_trips_through_json() {
        let e = UnitError::Render {
            unit: 3,
            detail: "bitmap allocation failed".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: UnitError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, UnitError::Render { unit: 3, .. }));
    }
}
