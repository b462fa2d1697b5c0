//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::StudioConfigBuilder::progress_callback`] to be told about
//! each record as soon as its own update lands in the store.
//!
//! # Example
//!
//! ```rust
//! use base64_studio::{BatchProgressCallback, FileRecord, StudioConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, record: &FileRecord) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} done", index + 1, total, record.name);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = StudioConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::record::FileRecord;
use std::sync::Arc;

/// Called by the batch pipeline as it processes each file.
///
/// Files are processed one at a time, so events for one batch never overlap.
/// All methods have no-op defaults.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first file is touched.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called right after a record moves to `processing`.
    ///
    /// # Arguments
    /// * `index`: 0-based position in the batch
    fn on_file_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called after a record is stored as `completed`.
    ///
    /// Note that `completed` includes files whose extraction failed; inspect
    /// `record.extracted_text` to tell them apart.
    fn on_file_complete(&self, index: usize, total: usize, record: &FileRecord) {
        let _ = (index, total, record);
    }

    /// Called after a record is stored as `error`.
    fn on_file_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let _ = (index, total, name, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, completed: usize) {
        let _ = (total_files, completed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::StudioConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
