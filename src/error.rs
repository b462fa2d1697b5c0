//! Error types for the base64-studio library.
//!
//! Failures are isolated to the smallest unit that can absorb them:
//!
//! * [`StudioError`] (fatal): the request cannot start at all (input path
//!   missing, provider not configured, export file unwritable).
//!
//! * [`FileError`]: a failure escaped one file's pipeline. The record is
//!   marked `error` and the batch moves on.
//!
//! * [`SplitError`]: PDF rasterisation failed. Always recovered by falling
//!   back to whole-file encoding.
//!
//! * [`ExtractionError`]: the model call failed. Recovered by storing an
//!   inline `Extraction failed: …` message; the record still completes.
//!
//! * [`DecodeError`]: a base64 string could not be turned into a preview.
//!
//! * [`StoreError`]: an update addressed a missing record or asked for an
//!   illegal status transition.

use crate::record::{FileId, FileStatus};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the base64-studio library.
#[derive(Debug, Error)]
pub enum StudioError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file or folder was not found at the given path.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file or folder.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a usable path or URL.
    #[error("Invalid input '{input}': not a file, a folder, or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Raw files and placeholder records were not index-aligned.
    #[error("Batch mismatch: {files} files but {records} records")]
    BatchMismatch { files: usize, records: usize },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// The spreadsheet serializer rejected the rows.
    #[error("Failed to build workbook '{path}': {detail}")]
    ExportFailed { path: PathBuf, detail: String },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A failure that escaped one file's pipeline; the record ends in `error`.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// Reading the source bytes failed.
    #[error("Failed to read '{name}': {detail}")]
    ReadFailed { name: String, detail: String },

    /// The file has no bytes, so there is nothing to encode.
    #[error("File '{name}' is empty")]
    Empty { name: String },

    /// The store rejected an update for this file.
    #[error("{0}")]
    Store(String),

    /// A collaborator panicked while handling this file.
    #[error("Processing panicked: {0}")]
    Panicked(String),
}

impl From<StoreError> for FileError {
    fn from(e: StoreError) -> Self {
        FileError::Store(e.to_string())
    }
}

/// PDF rasterisation failure.
#[derive(Debug, Clone, Error)]
pub enum SplitError {
    /// No pdfium library could be loaded.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH to the directory containing libpdfium."
    )]
    Binding(String),

    /// The bytes are not a PDF pdfium can open.
    #[error("Not a valid PDF: {0}")]
    InvalidPdf(String),

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RenderFailed { page: u32, detail: String },

    /// PNG encoding of a rendered page failed.
    #[error("Image encoding failed for page {page}: {detail}")]
    EncodeFailed { page: u32, detail: String },

    /// The document rendered zero pages.
    #[error("PDF has no renderable pages")]
    NoPages,

    /// The blocking render task did not complete.
    #[error("Render task failed: {0}")]
    Task(String),
}

/// Extraction-service failure.
///
/// The display string is what follows `Extraction failed: ` in the record.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    /// Transport or provider error.
    #[error("Failed to extract text using AI: {0}")]
    Api(String),

    /// The call exceeded `api_timeout_secs`.
    #[error("Extraction timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Why a base64 string could not be previewed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Manual conversion of empty or whitespace-only input.
    #[error("Please enter a base64 string.")]
    Empty,

    /// The payload did not decode or render.
    #[error("Invalid base64 string format.")]
    InvalidFormat { detail: String },

    /// No known signature matched and the policy rejects unknown formats.
    #[error("Unrecognised base64 payload: no known file signature at '{prefix}'")]
    UnknownFormat { prefix: String },
}

/// Rejected store mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("No record with id {0}")]
    NotFound(FileId),

    #[error("Record {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: FileId,
        from: FileStatus,
        to: FileStatus,
    },
}
