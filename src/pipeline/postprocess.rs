//! Post-processing: turn the model's raw reply into the text stored on a record.
//!
//! Model output goes through two cheap, deterministic passes in
//! [`VlmExtractor`](crate::pipeline::llm::VlmExtractor) (line endings, then
//! outer code fences). The pipeline then merges the reply with the file's own
//! payloads in [`merge_response`]:
//!
//! - single image: the first `{{image_data}}` placeholder is swapped for the
//!   real base64 payload
//! - split PDF: a `pages` array of short base64 previews is injected into the
//!   JSON object
//! - failure: `Extraction failed: <message>`

use crate::error::ExtractionError;
use crate::prompts::IMAGE_DATA_PLACEHOLDER;
use crate::record::{PageImage, PagePreview};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Prefix stored in place of the extracted text when the model call fails.
pub const EXTRACTION_FAILED_PREFIX: &str = "Extraction failed: ";

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?[ \t]*\n(.*)\n```\s*$").unwrap());

/// Remove a ```` ```json ```` fence wrapping the whole reply.
///
/// Models sometimes disobey "do not wrap in fences". Text with no outer fence
/// is returned unchanged apart from CRLF normalisation.
pub fn strip_json_fences(input: &str) -> String {
    let normalised = input.replace("\r\n", "\n");
    match RE_OUTER_FENCES.captures(normalised.trim()) {
        Some(caps) => caps[1].to_string(),
        None => normalised,
    }
}

/// Replace the first `{{image_data}}` with the file's base64 payload.
pub fn substitute_image_data(text: &str, base64: &str) -> String {
    text.replacen(IMAGE_DATA_PLACEHOLDER, base64, 1)
}

/// First `len` characters of a page payload, then `...`.
pub fn page_preview(base64: &str, len: usize) -> String {
    let mut preview: String = base64.chars().take(len).collect();
    preview.push_str("...");
    preview
}

pub fn page_previews(pages: &[PageImage], len: usize) -> Vec<PagePreview> {
    pages
        .iter()
        .map(|p| PagePreview {
            page_number: p.page_number,
            base64_preview: page_preview(&p.base64, len),
        })
        .collect()
}

/// Inject a `pages` array of previews into a JSON object reply.
///
/// Anything that is not a JSON object (invalid JSON, arrays, scalars) is
/// returned untouched. Key order of the reply is preserved.
pub fn attach_page_previews(text: &str, pages: &[PageImage], preview_len: usize) -> String {
    let mut value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            debug!("Reply is not JSON, keeping raw text: {}", e);
            return text.to_string();
        }
    };

    let Some(object) = value.as_object_mut() else {
        debug!("Reply is JSON but not an object, keeping raw text");
        return text.to_string();
    };

    let previews = page_previews(pages, preview_len);
    match serde_json::to_value(previews) {
        Ok(array) => {
            object.insert("pages".to_string(), array);
        }
        Err(_) => return text.to_string(),
    }

    serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string())
}

/// Produce the text stored on a record from the extraction outcome.
pub fn merge_response(
    result: Result<String, ExtractionError>,
    base64: &str,
    pages: Option<&[PageImage]>,
    preview_len: usize,
) -> String {
    match (result, pages) {
        (Ok(text), Some(pages)) => attach_page_previews(&text, pages, preview_len),
        (Ok(text), None) => substitute_image_data(&text, base64),
        (Err(e), _) => format!("{}{}", EXTRACTION_FAILED_PREFIX, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages() -> Vec<PageImage> {
        vec![
            PageImage {
                page_number: 1,
                base64: "A".repeat(150),
            },
            PageImage {
                page_number: 2,
                base64: "B".repeat(40),
            },
        ]
    }

    #[test]
    fn test_strip_fences() {
        let input = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_json_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fences_no_lang() {
        let input = "```\n{\"a\": 1}\n```\n";
        assert_eq!(strip_json_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fences_crlf() {
        let input = "```json\r\n{\"a\": 1}\r\n```";
        assert_eq!(strip_json_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn test_no_fences_passthrough() {
        assert_eq!(strip_json_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn only_first_placeholder_is_replaced() {
        let text = r#"{"document_data": "{{image_data}}", "echo": "{{image_data}}"}"#;
        let out = substitute_image_data(text, "QUJD");
        assert_eq!(out, r#"{"document_data": "QUJD", "echo": "{{image_data}}"}"#);
    }

    #[test]
    fn preview_is_prefix_plus_ellipsis() {
        assert_eq!(page_preview("abcdef", 3), "abc...");
        assert_eq!(page_preview("ab", 3), "ab...");
    }

    #[test]
    fn previews_injected_into_object() {
        let text = r#"{"document_category":"Passport","document_details":{"name":"A"}}"#;
        let out = attach_page_previews(text, &pages(), 100);
        let v: Value = serde_json::from_str(&out).unwrap();
        let arr = v["pages"].as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["page_number"], 1);
        assert_eq!(
            arr[0]["base64_preview"].as_str().unwrap(),
            format!("{}...", "A".repeat(100))
        );
        assert_eq!(
            arr[1]["base64_preview"].as_str().unwrap(),
            format!("{}...", "B".repeat(40))
        );
        // pretty, two-space indent, original key order kept
        assert!(out.starts_with("{\n  \"document_category\""));
    }

    #[test]
    fn non_json_or_non_object_kept_raw() {
        assert_eq!(attach_page_previews("not json", &pages(), 100), "not json");
        assert_eq!(attach_page_previews("[1,2]", &pages(), 100), "[1,2]");
    }

    #[test]
    fn failure_is_stored_inline() {
        let out = merge_response(
            Err(ExtractionError::Api("HTTP 500".into())),
            "QUJD",
            None,
            100,
        );
        assert_eq!(out, "Extraction failed: Failed to extract text using AI: HTTP 500");
    }

    #[test]
    fn single_image_merge_substitutes() {
        let out = merge_response(
            Ok(r#"{"document_data":"{{image_data}}"}"#.into()),
            "QUJD",
            None,
            100,
        );
        assert_eq!(out, r#"{"document_data":"QUJD"}"#);
    }
}
