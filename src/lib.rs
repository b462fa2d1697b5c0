//! # base64-studio
//!
//! Batch-convert document images and PDFs to base64, extract structured
//! identity-document fields with a Vision Language Model, export the results
//! to a spreadsheet, and decode arbitrary base64 back into files.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files / folders / URLs
//!  │
//!  ├─ 1. Input    resolve into raw blobs (folder label, MIME type, size)
//!  ├─ 2. Records  one `pending` FileRecord per blob in the BatchStore
//!  ├─ 3. Split    PDF → page PNGs via pdfium (fallback: whole file)
//!  ├─ 4. Encode   bytes → base64
//!  ├─ 5. Extract  image(s) → JSON via gemini / gpt-4.1 / claude / …
//!  ├─ 6. Merge    placeholder substitution or page-preview injection
//!  └─ 7. Export   completed records → processed_documents.xlsx
//! ```
//!
//! Files are processed strictly one at a time. A failure is absorbed by the
//! smallest unit that can hold it: a bad PDF falls back to whole-file
//! encoding, a failed model call is stored inline on a `completed` record,
//! and only a failure escaping the whole per-file pipeline marks the record
//! `error`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use base64_studio::{process_inputs, BatchStore, StudioConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = StudioConfig::default();
//!     let store = BatchStore::new();
//!     let summary = process_inputs(&["scans/".to_string()], &store, &config).await?;
//!     eprintln!("{}/{} completed", summary.completed, summary.total);
//!     for record in store.completed() {
//!         println!("{}: {}", record.name, record.extracted_text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Decoding
//!
//! ```rust
//! use base64_studio::decode::{decode_input, Trigger};
//! use base64_studio::UnknownFormatPolicy;
//!
//! let res = decode_input("JVBERi0xLjQK", Trigger::Manual, UnknownFormatPolicy::AssumePng)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(res.mime_type, "application/pdf");
//! assert_eq!(res.file_name(), "converted-file.pdf");
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `b64studio` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! base64-studio = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod debounce;
pub mod decode;
pub mod display;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{prepare_records, process_inputs, BatchProcessor, BatchSummary};
pub use config::{DecodeConfig, StudioConfig, StudioConfigBuilder, UnknownFormatPolicy};
pub use decode::{DecodedResource, Preview, PreviewKind};
pub use error::{
    DecodeError, ExtractionError, FileError, SplitError, StoreError, StudioError,
};
pub use export::{export_records, ExportOutcome, SheetWriter, XlsxSheetWriter};
pub use pipeline::input::RawFile;
pub use pipeline::llm::{ExtractionInput, Extractor, VlmExtractor};
pub use pipeline::render::{PageSplitter, PdfiumSplitter};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{ExtractedDocument, FileId, FileRecord, FileStatus, PageImage};
pub use store::BatchStore;
