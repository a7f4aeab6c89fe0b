//! Series map loading from a product-list spreadsheet.
//!
//! Sales teams maintain an xlsx with one row per product, carrying at least
//! a model-code column and a display-name column. The series of a product
//! is the display name up to the first `-` ("軌道燈-黑" → "軌道燈"), which
//! is how the catalogs group products in practice. The resulting map lets
//! callers enrich extracted records whose `series` field came back empty.

use crate::error::CatalogError;
use calamine::{open_workbook, Data, Reader, Xlsx};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Accepted spellings of the model-code column header.
const MODEL_HEADERS: &[&str] = &["型號", "產品型號", "product code", "model"];

/// Accepted spellings of the display-name column header.
const NAME_HEADERS: &[&str] = &["品名", "名稱", "name"];

/// How many leading rows are scanned for the header row. Spreadsheets from
/// sales often carry a title or a merged banner row above the real headers.
const HEADER_SCAN_ROWS: usize = 10;

/// Map from series label to the model codes under it, in row order.
pub type SeriesMap = BTreeMap<String, Vec<String>>;

/// Load the series map from the first worksheet of an xlsx file.
///
/// Rows with an empty model cell are skipped. Rows with an empty display
/// name land under the `""` series rather than being dropped, so no model
/// code silently disappears.
pub fn load_series_map(path: &Path) -> Result<SeriesMap, CatalogError> {
    if !path.exists() {
        return Err(CatalogError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e| CatalogError::SpreadsheetFormat {
            path: path.to_path_buf(),
            detail: format!("could not open workbook: {e}"),
        })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| CatalogError::SpreadsheetFormat {
            path: path.to_path_buf(),
            detail: "workbook has no worksheets".into(),
        })?
        .map_err(|e| CatalogError::SpreadsheetFormat {
            path: path.to_path_buf(),
            detail: format!("could not read first worksheet: {e}"),
        })?;

    let rows: Vec<&[Data]> = range.rows().collect();
    let (header_row, model_col, name_col) =
        locate_columns(&rows).ok_or_else(|| CatalogError::SpreadsheetFormat {
            path: path.to_path_buf(),
            detail: format!(
                "no header row with both a model column and a name column in the first {HEADER_SCAN_ROWS} rows"
            ),
        })?;

    let mut map = SeriesMap::new();
    let mut skipped = 0usize;
    for row in rows.iter().skip(header_row + 1) {
        let model = cell_as_string(row.get(model_col));
        if model.is_empty() {
            skipped += 1;
            continue;
        }
        let name = cell_as_string(row.get(name_col));
        let series = series_of(&name);
        map.entry(series).or_default().push(model);
    }

    if skipped > 0 {
        debug!("series map: skipped {skipped} rows without a model code");
    }
    info!(
        "series map loaded from '{}': {} series, {} models",
        path.display(),
        map.len(),
        map.values().map(Vec::len).sum::<usize>()
    );
    Ok(map)
}

/// The series label for a display name: everything before the first `-`.
pub fn series_of(name: &str) -> String {
    name.split('-').next().unwrap_or_default().trim().to_string()
}

/// Find the header row and the model/name column indices.
fn locate_columns(rows: &[&[Data]]) -> Option<(usize, usize, usize)> {
    for (row_idx, row) in rows.iter().take(HEADER_SCAN_ROWS).enumerate() {
        let mut model_col = None;
        let mut name_col = None;
        for (col_idx, cell) in row.iter().enumerate() {
            let header = cell_as_string(Some(cell)).to_lowercase();
            if header.is_empty() {
                continue;
            }
            if model_col.is_none() && MODEL_HEADERS.iter().any(|h| header == *h) {
                model_col = Some(col_idx);
            } else if name_col.is_none() && NAME_HEADERS.iter().any(|h| header == *h) {
                name_col = Some(col_idx);
            }
        }
        if let (Some(m), Some(n)) = (model_col, name_col) {
            return Some((row_idx, m, n));
        }
    }
    None
}

/// Cell content as trimmed text; numeric cells are stringified, everything
/// else is empty.
fn cell_as_string(cell: Option<&Data>) -> String {
    match cell {
        Some(Data::String(s)) => s.trim().to_string(),
        Some(Data::Float(f)) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Some(Data::Int(i)) => i.to_string(),
        _ => String::new(),
    }
}
