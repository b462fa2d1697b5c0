//! Batch pipeline integration tests.
//!
//! pdfium and the vision model are replaced with scripted collaborators so
//! these run offline and deterministically.

use async_trait::async_trait;
use base64_studio::{
    export_records, BatchProcessor, BatchProgressCallback, BatchStore, ExportOutcome,
    ExtractedDocument, ExtractionError, ExtractionInput, Extractor, FileRecord, FileStatus,
    PageImage, PageSplitter, RawFile, SplitError, StudioConfig, XlsxSheetWriter,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Scripted collaborators ───────────────────────────────────────────────────

enum SplitBehaviour {
    Fail,
    Pages(Vec<PageImage>),
    Panic,
}

struct ScriptedSplitter(SplitBehaviour);

#[async_trait]
impl PageSplitter for ScriptedSplitter {
    async fn split(&self, _pdf: &[u8]) -> Result<Vec<PageImage>, SplitError> {
        match &self.0 {
            SplitBehaviour::Fail => Err(SplitError::InvalidPdf("corrupt xref".into())),
            SplitBehaviour::Pages(pages) => Ok(pages.clone()),
            SplitBehaviour::Panic => panic!("pdfium exploded"),
        }
    }
}

/// Replies in order; falls back to `default` once the script runs out.
struct ScriptedExtractor {
    replies: Mutex<VecDeque<Result<String, ExtractionError>>>,
    default: String,
    image_counts: Mutex<Vec<usize>>,
}

impl ScriptedExtractor {
    fn new(replies: Vec<Result<String, ExtractionError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            default: r#"{"document_category":"ID","document_details":{"name":"A"},"document_data":"{{image_data}}"}"#
                .to_string(),
            image_counts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(
        &self,
        input: ExtractionInput<'_>,
        _mime_type: &str,
    ) -> Result<String, ExtractionError> {
        self.image_counts.lock().unwrap().push(input.image_count());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.default.clone()))
    }
}

#[derive(Default)]
struct Counting {
    starts: AtomicUsize,
    completes: AtomicUsize,
    errors: AtomicUsize,
    batch_completed: AtomicUsize,
}

impl BatchProgressCallback for Counting {
    fn on_file_start(&self, _index: usize, _total: usize, _name: &str) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_file_complete(&self, _index: usize, _total: usize, _record: &FileRecord) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }
    fn on_file_error(&self, _index: usize, _total: usize, _name: &str, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_batch_complete(&self, _total: usize, completed: usize) {
        self.batch_completed.store(completed, Ordering::SeqCst);
    }
}

fn processor(split: SplitBehaviour, extractor: Arc<ScriptedExtractor>) -> BatchProcessor {
    BatchProcessor::new(
        Arc::new(ScriptedSplitter(split)),
        extractor,
        StudioConfig::default(),
    )
}

fn png(name: &str, bytes: &[u8]) -> RawFile {
    RawFile::from_bytes(name, "Root", "image/png", bytes.to_vec())
}

fn pdf(name: &str) -> RawFile {
    RawFile::from_bytes(name, "scans", "application/pdf", b"%PDF-1.4 fake".to_vec())
}

fn two_pages() -> Vec<PageImage> {
    vec![
        PageImage {
            page_number: 1,
            base64: "P".repeat(120),
        },
        PageImage {
            page_number: 2,
            base64: "Q".repeat(120),
        },
    ]
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_record_reaches_a_terminal_status() {
    let store = BatchStore::new();
    let files = vec![png("a.png", b"one"), pdf("b.pdf"), png("c.png", b"three")];

    let summary = processor(SplitBehaviour::Fail, ScriptedExtractor::new(vec![]))
        .submit(&store, &files)
        .await
        .unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.failed, 0);
    assert!(store
        .snapshot()
        .iter()
        .all(|r| r.status.is_terminal()));
    assert!(!store.is_processing());
}

#[tokio::test]
async fn unsplittable_pdf_falls_back_to_whole_file() {
    let store = BatchStore::new();
    let extractor = ScriptedExtractor::new(vec![]);
    processor(SplitBehaviour::Fail, extractor.clone())
        .submit(&store, &[pdf("broken.pdf")])
        .await
        .unwrap();

    let rec = &store.snapshot()[0];
    assert_eq!(rec.status, FileStatus::Completed);
    assert!(!rec.base64.is_empty());
    assert!(rec.pages.is_none());
    // whole file sent as one image, placeholder replaced by its base64
    assert_eq!(*extractor.image_counts.lock().unwrap(), vec![1]);
    assert!(rec.extracted_text.contains(&rec.base64));
}

#[tokio::test]
async fn split_pdf_gets_page_previews() {
    let store = BatchStore::new();
    let extractor = ScriptedExtractor::new(vec![Ok(
        r#"{"document_category":"Passport","document_details":{"name":"Jane"}}"#.to_string(),
    )]);
    let summary = processor(SplitBehaviour::Pages(two_pages()), extractor.clone())
        .submit(&store, &[pdf("passport.pdf")])
        .await
        .unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(*extractor.image_counts.lock().unwrap(), vec![2]);

    let rec = &store.snapshot()[0];
    assert_eq!(rec.base64, "P".repeat(120));
    assert_eq!(rec.pages.as_ref().map(Vec::len), Some(2));

    let ExtractedDocument::Recognized(doc) = rec.document() else {
        panic!("expected a recognized document, got {:?}", rec.extracted_text);
    };
    assert_eq!(doc.pages.len(), 2);
    assert_eq!(doc.pages[1].page_number, 2);
    assert_eq!(doc.pages[1].base64_preview, format!("{}...", "Q".repeat(100)));
}

#[tokio::test]
async fn extraction_failure_completes_and_does_not_block_later_files() {
    let store = BatchStore::new();
    let extractor = ScriptedExtractor::new(vec![Err(ExtractionError::Api("quota".into()))]);
    let files = vec![png("first.png", b"1"), png("second.png", b"2")];

    processor(SplitBehaviour::Fail, extractor)
        .submit(&store, &files)
        .await
        .unwrap();

    let records = store.snapshot();
    let first = records.iter().find(|r| r.name == "first.png").unwrap();
    let second = records.iter().find(|r| r.name == "second.png").unwrap();

    assert_eq!(first.status, FileStatus::Completed);
    assert!(first.extracted_text.starts_with("Extraction failed: "));
    assert!(first.extracted_text.contains("quota"));
    assert_eq!(second.status, FileStatus::Completed);
    assert!(second.document().is_recognized());
}

#[tokio::test]
async fn panicking_splitter_marks_only_that_file_as_error() {
    let store = BatchStore::new();
    let counting = Arc::new(Counting::default());
    let config = StudioConfig::builder()
        .progress_callback(counting.clone() as Arc<dyn BatchProgressCallback>)
        .build()
        .unwrap();
    let processor = BatchProcessor::new(
        Arc::new(ScriptedSplitter(SplitBehaviour::Panic)),
        ScriptedExtractor::new(vec![]),
        config,
    );

    let summary = processor
        .submit(&store, &[pdf("bad.pdf"), png("ok.png", b"fine")])
        .await
        .unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 1);

    let records = store.snapshot();
    let bad = records.iter().find(|r| r.name == "bad.pdf").unwrap();
    assert_eq!(bad.status, FileStatus::Error);
    assert!(bad.error.as_deref().unwrap().contains("pdfium exploded"));
    assert!(!store.is_processing());

    assert_eq!(counting.starts.load(Ordering::SeqCst), 2);
    assert_eq!(counting.completes.load(Ordering::SeqCst), 1);
    assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
    assert_eq!(counting.batch_completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreadable_file_is_marked_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gone.png");
    std::fs::write(&path, b"soon deleted").unwrap();
    let file = RawFile::from_path(&path, "Root").unwrap();
    std::fs::remove_file(&path).unwrap();

    let store = BatchStore::new();
    let summary = processor(SplitBehaviour::Fail, ScriptedExtractor::new(vec![]))
        .submit(&store, &[file])
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    let rec = &store.snapshot()[0];
    assert_eq!(rec.status, FileStatus::Error);
    assert!(rec.error.as_deref().unwrap().contains("gone.png"));
}

#[tokio::test]
async fn new_batch_is_prepended() {
    let store = BatchStore::new();
    let p = processor(SplitBehaviour::Fail, ScriptedExtractor::new(vec![]));
    p.submit(&store, &[png("old.png", b"o")]).await.unwrap();
    p.submit(&store, &[png("new1.png", b"a"), png("new2.png", b"b")])
        .await
        .unwrap();

    let names: Vec<String> = store.snapshot().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["new1.png", "new2.png", "old.png"]);
}

/// Answers after a fixed delay, so batches overlap in time.
struct SlowExtractor;

#[async_trait]
impl Extractor for SlowExtractor {
    async fn extract(
        &self,
        _input: ExtractionInput<'_>,
        _mime_type: &str,
    ) -> Result<String, ExtractionError> {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        Ok(r#"{"document_category":"ID","document_details":{"name":"A"}}"#.to_string())
    }
}

#[tokio::test]
async fn overlapping_submits_both_finish() {
    let store = Arc::new(BatchStore::new());
    let processor = BatchProcessor::new(
        Arc::new(ScriptedSplitter(SplitBehaviour::Fail)),
        Arc::new(SlowExtractor),
        StudioConfig::default(),
    );

    let first = {
        let (store, processor) = (Arc::clone(&store), processor.clone());
        tokio::spawn(async move { processor.submit(&store, &[png("a.png", b"a")]).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let second = processor.submit(&store, &[png("b.png", b"b")]).await.unwrap();
    let first = first.await.unwrap().unwrap();

    assert_eq!(first.completed, 1);
    assert_eq!(second.completed, 1);
    let records = store.snapshot();
    assert_eq!(records.len(), 2);
    assert!(
        records.iter().all(|r| r.status == FileStatus::Completed),
        "{:?}",
        records.iter().map(|r| (&r.name, r.status)).collect::<Vec<_>>()
    );
    assert!(!store.is_processing());
}

#[tokio::test]
async fn zero_byte_file_is_marked_error() {
    let store = BatchStore::new();
    let summary = processor(SplitBehaviour::Fail, ScriptedExtractor::new(vec![]))
        .submit(&store, &[png("empty.png", b""), png("full.png", b"x")])
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.completed, 1);
    let records = store.snapshot();
    let empty = records.iter().find(|r| r.name == "empty.png").unwrap();
    assert_eq!(empty.status, FileStatus::Error);
    assert!(records
        .iter()
        .filter(|r| r.status == FileStatus::Completed)
        .all(|r| !r.base64.is_empty()));
}

#[tokio::test]
async fn completed_records_export_to_xlsx() {
    let store = BatchStore::new();
    let extractor = ScriptedExtractor::new(vec![Err(ExtractionError::Timeout { secs: 60 })]);
    processor(SplitBehaviour::Fail, extractor)
        .submit(&store, &[png("a.png", b"aaa"), png("b.png", b"bbb")])
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nested/processed_documents.xlsx");
    let outcome = export_records(&store.snapshot(), &out, &XlsxSheetWriter, 32_000)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ExportOutcome::Written {
            path: out.clone(),
            rows: 2
        }
    );
    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(&bytes[..2], b"PK");
    assert!(!out.with_extension("xlsx.tmp").exists());
}

#[tokio::test]
async fn exporting_an_empty_store_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("processed_documents.xlsx");
    let outcome = export_records(&[], &out, &XlsxSheetWriter, 32_000)
        .await
        .unwrap();

    assert_eq!(outcome, ExportOutcome::NothingToExport);
    assert!(!out.exists());
}
