//! The per-file processing pipeline.
//!
//! Files are processed **strictly one at a time**, in selection order:
//!
//! ```text
//! pending ─▶ processing ─▶ [split PDF | encode file] ─▶ extract ─▶ merge ─▶ completed
//!                 │
//!                 └──────────── anything escaping ───────────────────▶ error
//! ```
//!
//! Recoverable failures stay inside the file's success path:
//!
//! - a PDF that cannot be split is encoded whole instead
//! - a failed model call stores `Extraction failed: <message>` and the record
//!   still completes
//!
//! Only a failure that escapes the whole per-file pipeline (unreadable file,
//! rejected store update, a panic inside a collaborator) marks the record
//! `error`. Either way the loop moves on to the next file.

use crate::config::StudioConfig;
use crate::error::{FileError, StudioError};
use crate::pipeline::encode;
use crate::pipeline::input::{self, RawFile};
use crate::pipeline::llm::{ExtractionInput, Extractor, VlmExtractor};
use crate::pipeline::postprocess;
use crate::pipeline::render::{PageSplitter, PdfiumSplitter};
use crate::progress::{BatchProgressCallback, NoopProgressCallback};
use crate::record::{FileId, FileRecord, PageImage};
use crate::store::{BatchStore, CompletedFile};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Counts for one processed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Rendered PDF pages across the batch.
    pub pages: usize,
    pub duration_ms: u64,
}

/// Fresh `pending` records, index-aligned with `files`.
pub fn prepare_records(files: &[RawFile]) -> Vec<FileRecord> {
    files
        .iter()
        .map(|f| FileRecord::pending(&f.name, &f.folder, &f.mime_type, f.size))
        .collect()
}

/// Drives records through the pipeline with pluggable collaborators.
#[derive(Clone)]
pub struct BatchProcessor {
    splitter: Arc<dyn PageSplitter>,
    extractor: Arc<dyn Extractor>,
    config: StudioConfig,
}

impl std::fmt::Debug for BatchProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BatchProcessor {
    pub fn new(
        splitter: Arc<dyn PageSplitter>,
        extractor: Arc<dyn Extractor>,
        config: StudioConfig,
    ) -> Self {
        Self {
            splitter,
            extractor,
            config,
        }
    }

    /// pdfium splitter plus a vision-model extractor resolved from `config`.
    pub fn from_config(config: StudioConfig) -> Result<Self, StudioError> {
        let extractor = VlmExtractor::from_config(&config)?;
        let splitter = PdfiumSplitter::from_config(&config);
        Ok(Self::new(Arc::new(splitter), Arc::new(extractor), config))
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    /// Create records for `files`, add them to the store, and process them.
    ///
    /// The records are listed as `pending` right away; if another batch is
    /// running on `store`, processing starts once it finishes.
    pub async fn submit(
        &self,
        store: &BatchStore,
        files: &[RawFile],
    ) -> Result<BatchSummary, StudioError> {
        let records = prepare_records(files);
        store.append_batch(records.clone());
        self.process(store, files, &records).await
    }

    /// Process `files` against their already-stored `records`, in order.
    /// Waits for any batch already running on `store`.
    pub async fn process(
        &self,
        store: &BatchStore,
        files: &[RawFile],
        records: &[FileRecord],
    ) -> Result<BatchSummary, StudioError> {
        if files.len() != records.len() {
            return Err(StudioError::BatchMismatch {
                files: files.len(),
                records: records.len(),
            });
        }
        let _turn = store.begin_batch().await;

        let noop: Arc<dyn BatchProgressCallback> = Arc::new(NoopProgressCallback);
        let progress = self.config.progress_callback.clone().unwrap_or(noop);

        let start = Instant::now();
        let total = files.len();
        let mut summary = BatchSummary {
            total,
            ..Default::default()
        };

        info!("Processing batch of {} files", total);
        progress.on_batch_start(total);

        for (index, (file, record)) in files.iter().zip(records).enumerate() {
            let outcome = AssertUnwindSafe(self.process_one(
                store,
                file,
                record.id,
                index,
                total,
                progress.as_ref(),
            ))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(FileError::Panicked(panic_message(payload))));

            match outcome {
                Ok(done) => {
                    summary.completed += 1;
                    summary.pages += done.pages.as_ref().map_or(0, Vec::len);
                    progress.on_file_complete(index, total, &done);
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!("File '{}' failed: {}", file.name, message);
                    if let Err(store_err) = store.fail(record.id, message.clone()) {
                        warn!("Could not mark '{}' as error: {}", file.name, store_err);
                    }
                    summary.failed += 1;
                    progress.on_file_error(index, total, &file.name, &message);
                }
            }
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Batch done: {}/{} completed, {} failed, {} pages, {}ms",
            summary.completed, summary.total, summary.failed, summary.pages, summary.duration_ms
        );
        progress.on_batch_complete(total, summary.completed);

        Ok(summary)
    }

    async fn process_one(
        &self,
        store: &BatchStore,
        file: &RawFile,
        id: FileId,
        index: usize,
        total: usize,
        progress: &dyn BatchProgressCallback,
    ) -> Result<FileRecord, FileError> {
        store.mark_processing(id)?;
        progress.on_file_start(index, total, &file.name);

        let bytes = file.read().await?;
        if bytes.is_empty() {
            return Err(FileError::Empty {
                name: file.name.clone(),
            });
        }
        let (base64, pages) = self.encode(file, &bytes).await;
        if base64.is_empty() {
            return Err(FileError::Empty {
                name: file.name.clone(),
            });
        }

        let input = match pages.as_deref() {
            Some(pages) => ExtractionInput::Pages(pages),
            None => ExtractionInput::Single(&base64),
        };
        let result = self.extractor.extract(input, &file.mime_type).await;
        if let Err(ref e) = result {
            warn!("Extraction failed for '{}': {}", file.name, e);
        }

        let extracted_text = postprocess::merge_response(
            result,
            &base64,
            pages.as_deref(),
            self.config.page_preview_len,
        );

        store
            .complete(
                id,
                CompletedFile {
                    base64,
                    pages,
                    extracted_text,
                },
            )
            .map_err(FileError::from)
    }

    /// Primary payload plus pages. PDFs are split when possible; anything
    /// else, or a PDF that will not split, is encoded whole.
    async fn encode(&self, file: &RawFile, bytes: &[u8]) -> (String, Option<Vec<PageImage>>) {
        if file.is_pdf() {
            match self.splitter.split(bytes).await {
                Ok(pages) if !pages.is_empty() => {
                    info!("'{}': split into {} pages", file.name, pages.len());
                    return (pages[0].base64.clone(), Some(pages));
                }
                Ok(_) => warn!("'{}': PDF split produced no pages, encoding whole file", file.name),
                Err(e) => warn!("'{}': PDF split failed ({}), encoding whole file", file.name, e),
            }
        }
        (encode::encode_bytes(bytes), None)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Generic error".to_string()
    }
}

/// Resolve `inputs` (files, folders, URLs) and process them into `store`
/// with the production collaborators.
pub async fn process_inputs(
    inputs: &[String],
    store: &BatchStore,
    config: &StudioConfig,
) -> Result<BatchSummary, StudioError> {
    let files = input::resolve_inputs(inputs, config).await?;
    let processor = BatchProcessor::from_config(config.clone())?;
    processor.submit(store, &files).await
}
