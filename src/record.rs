//! Per-file records and the extraction result model.
//!
//! A [`FileRecord`] is created in [`FileStatus::Pending`] the moment a file is
//! selected and is then driven through its lifecycle by the batch pipeline:
//!
//! ```text
//! pending ──▶ processing ──▶ completed
//!    │             │
//!    └─────────────┴───────▶ error
//! ```
//!
//! `completed` means "extraction text stored", not "extraction succeeded": a
//! failed model call leaves an inline `Extraction failed: …` message in
//! [`FileRecord::extracted_text`] and still completes the record. Only
//! `completed` records are exportable.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of a record, unique within a [`crate::store::BatchStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Lifecycle status of a [`FileRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

impl FileStatus {
    /// `completed` and `error` are terminal; only a full clear removes them.
    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Completed | FileStatus::Error)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: FileStatus) -> bool {
        matches!(
            (self, next),
            (FileStatus::Pending, FileStatus::Processing)
                | (FileStatus::Pending, FileStatus::Error)
                | (FileStatus::Processing, FileStatus::Completed)
                | (FileStatus::Processing, FileStatus::Error)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Processing => "processing",
            FileStatus::Completed => "completed",
            FileStatus::Error => "error",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rasterised PDF page, PNG-encoded as base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    /// 1-indexed page number.
    pub page_number: u32,
    pub base64: String,
}

/// One uploaded file and everything the pipeline learned about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    /// Top-level folder of the upload, or the configured root label.
    pub folder_name: String,
    /// Declared MIME type (from the extension or the HTTP `Content-Type`).
    pub mime_type: String,
    pub size: u64,
    /// Primary payload. For a split PDF this is the first page's PNG.
    pub base64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageImage>>,
    /// Raw model output after merging; may or may not be valid JSON.
    pub extracted_text: String,
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileRecord {
    /// A fresh `pending` record with empty payload fields.
    pub fn pending(
        name: impl Into<String>,
        folder_name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            id: FileId::new(),
            name: name.into(),
            folder_name: folder_name.into(),
            mime_type: mime_type.into(),
            size,
            base64: String::new(),
            pages: None,
            extracted_text: String::new(),
            status: FileStatus::Pending,
            error: None,
        }
    }

    /// Parse and classify the extracted text.
    pub fn document(&self) -> ExtractedDocument {
        ExtractedDocument::classify(&self.extracted_text)
    }
}

/// Fields the extraction prompt asks the model to look for.
///
/// Every field is optional: the model omits fields not present on the
/// document and sets visible-but-unreadable fields to `null`. Keys outside
/// the known set are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nic_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nic_issue_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dl_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dl_issue_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dl_expiry_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport_issue_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport_expiry_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_no: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocumentDetails {
    /// Non-empty fields in schema order, followed by any extra string fields.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let known = [
            ("name", &self.name),
            ("date_of_birth", &self.date_of_birth),
            ("address", &self.address),
            ("nic_no", &self.nic_no),
            ("nic_issue_date", &self.nic_issue_date),
            ("dl_no", &self.dl_no),
            ("dl_issue_date", &self.dl_issue_date),
            ("dl_expiry_date", &self.dl_expiry_date),
            ("passport_no", &self.passport_no),
            ("passport_issue_date", &self.passport_issue_date),
            ("passport_expiry_date", &self.passport_expiry_date),
            ("place_of_birth", &self.place_of_birth),
            ("id_no", &self.id_no),
        ];

        let mut out: Vec<(&str, &str)> = known
            .into_iter()
            .filter_map(|(k, v)| v.as_deref().filter(|s| !s.is_empty()).map(|s| (k, s)))
            .collect();

        out.extend(self.extra.iter().filter_map(|(k, v)| {
            v.as_str()
                .filter(|s| !s.is_empty())
                .map(|s| (k.as_str(), s))
        }));
        out
    }
}

/// Page summary injected into multi-page responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePreview {
    pub page_number: u32,
    pub base64_preview: String,
}

/// The response shape requested from the extraction model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    #[serde(default)]
    pub document_category: Option<String>,
    pub document_details: DocumentDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<PagePreview>,
}

/// Extracted text, classified once.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedDocument {
    /// Valid JSON carrying a `document_details` object.
    Recognized(Box<ExtractionResponse>),
    /// Anything else: invalid JSON, an inline failure message, or JSON of
    /// another shape. `raw` is the text exactly as stored.
    Unrecognized { raw: String },
}

impl ExtractedDocument {
    pub fn classify(text: &str) -> Self {
        let unrecognized = || ExtractedDocument::Unrecognized {
            raw: text.to_string(),
        };

        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return unrecognized();
        };
        let has_details = value
            .get("document_details")
            .map(Value::is_object)
            .unwrap_or(false);
        if !has_details {
            return unrecognized();
        }

        match serde_json::from_value::<ExtractionResponse>(value) {
            Ok(resp) => ExtractedDocument::Recognized(Box::new(resp)),
            Err(_) => unrecognized(),
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, ExtractedDocument::Recognized(_))
    }
}
