//! Owned store for the in-memory record collection.
//!
//! All writers go through a handful of entry points (`append_batch`,
//! `mark_processing`, `complete`, `fail`, `clear`) which take the write lock
//! for the duration of one update and enforce the status state machine.
//! Readers take snapshots, so a consumer polling the store sees each file's
//! status as soon as the pipeline stores it.
//!
//! Batches run one at a time per store. A batch submitted while another is
//! running waits for its turn (see [`BatchStore::begin_batch`]) and its
//! records stay visible as `pending` meanwhile.

use crate::error::StoreError;
use crate::record::{FileId, FileRecord, FileStatus, PageImage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Payload stored when a record completes.
#[derive(Debug, Clone, Default)]
pub struct CompletedFile {
    pub base64: String,
    pub pages: Option<Vec<PageImage>>,
    pub extracted_text: String,
}

/// The batch list plus the batch-level processing flag.
#[derive(Debug, Default)]
pub struct BatchStore {
    records: RwLock<Vec<FileRecord>>,
    processing: AtomicBool,
    turn: Mutex<()>,
}

/// Exclusive right to run a batch against a store. Lowers the processing
/// flag when dropped, including on panic or cancellation.
#[derive(Debug)]
pub struct BatchTurn<'a> {
    store: &'a BatchStore,
    _turn: MutexGuard<'a, ()>,
}

impl Drop for BatchTurn<'_> {
    fn drop(&mut self) {
        self.store.processing.store(false, Ordering::SeqCst);
    }
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Poison is ignored: no update leaves a record half-written.
    fn read(&self) -> RwLockReadGuard<'_, Vec<FileRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<FileRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a freshly selected batch. Newest batches are listed first.
    pub fn append_batch(&self, batch: Vec<FileRecord>) {
        let mut records = self.write();
        debug!("Appending batch of {} records", batch.len());
        records.splice(0..0, batch);
    }

    /// Discard every record.
    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn snapshot(&self) -> Vec<FileRecord> {
        self.read().clone()
    }

    pub fn get(&self, id: FileId) -> Option<FileRecord> {
        self.read().iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Records eligible for export.
    pub fn completed(&self) -> Vec<FileRecord> {
        self.read()
            .iter()
            .filter(|r| r.status == FileStatus::Completed)
            .cloned()
            .collect()
    }

    /// Whether a batch is currently running.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Wait until no other batch is running, then raise the processing flag.
    pub async fn begin_batch(&self) -> BatchTurn<'_> {
        let turn = self.turn.lock().await;
        self.processing.store(true, Ordering::SeqCst);
        BatchTurn {
            store: self,
            _turn: turn,
        }
    }

    /// `pending → processing`.
    pub fn mark_processing(&self, id: FileId) -> Result<(), StoreError> {
        self.transition(id, FileStatus::Processing, |_| {})
            .map(|_| ())
    }

    /// `processing → completed`, storing the payloads.
    pub fn complete(&self, id: FileId, done: CompletedFile) -> Result<FileRecord, StoreError> {
        self.transition(id, FileStatus::Completed, |r| {
            r.base64 = done.base64;
            r.pages = done.pages;
            r.extracted_text = done.extracted_text;
        })
    }

    /// `pending | processing → error`.
    pub fn fail(&self, id: FileId, message: impl Into<String>) -> Result<(), StoreError> {
        let message = message.into();
        self.transition(id, FileStatus::Error, |r| r.error = Some(message))
            .map(|_| ())
    }

    fn transition(
        &self,
        id: FileId,
        to: FileStatus,
        apply: impl FnOnce(&mut FileRecord),
    ) -> Result<FileRecord, StoreError> {
        let mut records = self.write();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;

        if !record.status.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                id,
                from: record.status,
                to,
            });
        }

        apply(record);
        record.status = to;
        debug!("Record {} ({}) → {}", id, record.name, to);
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(name: &str) -> FileRecord {
        FileRecord::pending(name, "Root", "image/png", 10)
    }

    #[test]
    fn newest_batch_first() {
        let store = BatchStore::new();
        store.append_batch(vec![pending("a"), pending("b")]);
        store.append_batch(vec![pending("c")]);
        let names: Vec<_> = store.snapshot().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn full_lifecycle() {
        let store = BatchStore::new();
        let rec = pending("a.png");
        let id = rec.id;
        store.append_batch(vec![rec]);

        store.mark_processing(id).unwrap();
        assert_eq!(store.get(id).unwrap().status, FileStatus::Processing);

        let done = store
            .complete(
                id,
                CompletedFile {
                    base64: "QUJD".into(),
                    pages: None,
                    extracted_text: "{}".into(),
                },
            )
            .unwrap();
        assert_eq!(done.status, FileStatus::Completed);
        assert_eq!(done.base64, "QUJD");
        assert_eq!(store.completed().len(), 1);
    }

    #[test]
    fn terminal_records_are_frozen() {
        let store = BatchStore::new();
        let rec = pending("a.png");
        let id = rec.id;
        store.append_batch(vec![rec]);
        store.mark_processing(id).unwrap();
        store.fail(id, "boom").unwrap();

        let err = store.mark_processing(id).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        let err = store.complete(id, CompletedFile::default()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        let rec = store.get(id).unwrap();
        assert_eq!(rec.status, FileStatus::Error);
        assert_eq!(rec.error.as_deref(), Some("boom"));
    }

    #[test]
    fn cannot_complete_without_processing() {
        let store = BatchStore::new();
        let rec = pending("a.png");
        let id = rec.id;
        store.append_batch(vec![rec]);
        assert!(store.complete(id, CompletedFile::default()).is_err());
    }

    #[tokio::test]
    async fn batch_turns_are_exclusive() {
        let store = BatchStore::new();
        let turn = store.begin_batch().await;
        assert!(store.is_processing());
        assert!(store.turn.try_lock().is_err());

        drop(turn);
        assert!(!store.is_processing());
        let _next = store.begin_batch().await;
        assert!(store.is_processing());
    }

    #[test]
    fn clear_discards_everything() {
        let store = BatchStore::new();
        let rec = pending("a.png");
        let id = rec.id;
        store.append_batch(vec![rec]);
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.mark_processing(id), Err(StoreError::NotFound(id)));
    }
}
