//! Spreadsheet export of completed records.
//!
//! One row per `completed` record, four columns:
//!
//! | Folder Name | File Name | Extracted Data (JSON) | Base64 Content |
//!
//! The JSON column holds the compact serialisation of the *cleaned* extracted
//! data (see [`clean_value`]); text that is not JSON is wrapped as
//! `{"error":"Invalid JSON","raw":…}`. The base64 column is cut to
//! `export_base64_max_len` characters.
//!
//! Serialisation sits behind [`SheetWriter`]; [`XlsxSheetWriter`] produces an
//! `.xlsx` workbook with `rust_xlsxwriter`. The file is written next to its
//! destination and renamed into place.

use crate::error::StudioError;
use crate::record::{FileRecord, FileStatus};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const EXPORT_SHEET_NAME: &str = "Processed Data";
pub const DEFAULT_EXPORT_FILE: &str = "processed_documents.xlsx";
pub const COLUMNS: [&str; 4] = [
    "Folder Name",
    "File Name",
    "Extracted Data (JSON)",
    "Base64 Content",
];
pub const MAX_BASE64_CELL_LEN: usize = 32_000;

/// Hard limit on characters in one spreadsheet cell.
pub const MAX_CELL_CHARS: usize = 32_767;

/// Drop null and empty-string values, then prune containers left empty.
///
/// Returns `None` when nothing survives.
pub fn clean_value(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(items) => {
            let kept: Vec<Value> = items.into_iter().filter_map(clean_value).collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| clean_value(v).map(|v| (k, v)))
                .collect();
            (!kept.is_empty()).then_some(Value::Object(kept))
        }
        other => Some(other),
    }
}

/// Compact JSON for the export column.
pub fn export_json(extracted_text: &str) -> String {
    let value = match serde_json::from_str::<Value>(extracted_text) {
        Ok(v) => clean_value(v).unwrap_or_else(|| Value::Object(Map::new())),
        Err(_) => json!({ "error": "Invalid JSON", "raw": extracted_text }),
    };
    value.to_string()
}

/// One flattened spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub folder_name: String,
    pub file_name: String,
    pub extracted_json: String,
    pub base64: String,
}

impl ExportRow {
    pub fn from_record(record: &FileRecord, base64_cap: usize) -> Self {
        Self {
            folder_name: record.folder_name.clone(),
            file_name: record.name.clone(),
            extracted_json: export_json(&record.extracted_text),
            base64: record.base64.chars().take(base64_cap).collect(),
        }
    }

    pub fn cells(&self) -> [&str; 4] {
        [
            &self.folder_name,
            &self.file_name,
            &self.extracted_json,
            &self.base64,
        ]
    }
}

/// Rows for every `completed` record, in store order.
pub fn build_rows(records: &[FileRecord], base64_cap: usize) -> Vec<ExportRow> {
    records
        .iter()
        .filter(|r| r.status == FileStatus::Completed)
        .map(|r| ExportRow::from_record(r, base64_cap))
        .collect()
}

/// Serialises one sheet of string rows into a workbook.
pub trait SheetWriter: Send + Sync {
    fn render(
        &self,
        sheet_name: &str,
        headers: &[&str],
        rows: &[ExportRow],
    ) -> Result<Vec<u8>, String>;
}

/// `.xlsx` output via `rust_xlsxwriter`.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxSheetWriter;

impl XlsxSheetWriter {
    fn build(
        &self,
        sheet_name: &str,
        headers: &[&str],
        rows: &[ExportRow],
    ) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_name)?;

        let bold = Format::new().set_bold();
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *header, &bold)?;
        }

        for (i, row) in rows.iter().enumerate() {
            let r = i as u32 + 1;
            for (col, cell) in row.cells().iter().enumerate() {
                sheet.write_string(r, col as u16, clip_cell(cell, &row.file_name))?;
            }
        }

        sheet.set_column_width(0, 18)?;
        sheet.set_column_width(1, 28)?;
        sheet.set_column_width(2, 60)?;
        sheet.set_column_width(3, 40)?;

        workbook.save_to_buffer()
    }
}

impl SheetWriter for XlsxSheetWriter {
    fn render(
        &self,
        sheet_name: &str,
        headers: &[&str],
        rows: &[ExportRow],
    ) -> Result<Vec<u8>, String> {
        self.build(sheet_name, headers, rows)
            .map_err(|e| e.to_string())
    }
}

fn clip_cell<'a>(cell: &'a str, file_name: &str) -> std::borrow::Cow<'a, str> {
    if cell.chars().count() <= MAX_CELL_CHARS {
        return std::borrow::Cow::Borrowed(cell);
    }
    warn!("Clipping oversized cell for '{}' to {} chars", file_name, MAX_CELL_CHARS);
    std::borrow::Cow::Owned(cell.chars().take(MAX_CELL_CHARS).collect())
}

/// Result of an export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Written { path: PathBuf, rows: usize },
    /// No record was `completed`; nothing was written.
    NothingToExport,
}

impl std::fmt::Display for ExportOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportOutcome::Written { path, rows } => {
                write!(f, "Exported {} rows to {}", rows, path.display())
            }
            ExportOutcome::NothingToExport => f.write_str("No completed files to export."),
        }
    }
}

/// Export every `completed` record in `records` to `path`.
pub async fn export_records(
    records: &[FileRecord],
    path: impl AsRef<Path>,
    writer: &dyn SheetWriter,
    base64_cap: usize,
) -> Result<ExportOutcome, StudioError> {
    let path = path.as_ref();
    let rows = build_rows(records, base64_cap);
    if rows.is_empty() {
        info!("Export skipped: no completed records");
        return Ok(ExportOutcome::NothingToExport);
    }

    let bytes = writer
        .render(EXPORT_SHEET_NAME, &COLUMNS, &rows)
        .map_err(|detail| StudioError::ExportFailed {
            path: path.to_path_buf(),
            detail,
        })?;

    write_atomic(path, &bytes).await?;
    info!("Exported {} rows to {}", rows.len(), path.display());

    Ok(ExportOutcome::Written {
        path: path.to_path_buf(),
        rows: rows.len(),
    })
}

/// Write to a sibling temp file, then rename over the destination.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StudioError> {
    let write_err = |e| StudioError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("xlsx.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
