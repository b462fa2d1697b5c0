//! Human-readable rendering of records for terminals and logs.

use crate::record::{ExtractedDocument, FileRecord, FileStatus};
use serde_json::Value;
use std::fmt::Write as _;

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Strings longer than this are shortened by [`truncate_long_strings`].
pub const LONG_STRING_LIMIT: usize = 1000;
const LONG_STRING_KEEP: usize = 50;

/// `0 Bytes`, `1.5 KB`, `2 MB`: base 1024, at most two decimals.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let fixed = format!("{:.2}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[unit])
}

/// First `len` characters followed by `...`, or `s` unchanged if it fits.
pub fn truncate(s: &str, len: usize) -> String {
    if s.chars().count() <= len {
        return s.to_string();
    }
    let mut out: String = s.chars().take(len).collect();
    out.push_str("...");
    out
}

/// Recursively shorten every string longer than 1000 characters to its
/// first and last 50 characters around a `... [TRUNCATED] ...` marker.
pub fn truncate_long_strings(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > LONG_STRING_LIMIT => {
            let chars: Vec<char> = s.chars().collect();
            let head: String = chars[..LONG_STRING_KEEP].iter().collect();
            let tail: String = chars[chars.len() - LONG_STRING_KEEP..].iter().collect();
            Value::String(format!("{head}... [TRUNCATED] ...{tail}"))
        }
        Value::Array(items) => Value::Array(items.iter().map(truncate_long_strings).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), truncate_long_strings(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Multi-line description of a record.
///
/// Recognized documents are shown as their non-empty detail fields unless
/// `full` is set; everything else is pretty JSON (long strings shortened
/// unless `full`), or the raw text when it is not JSON.
pub fn render_record(record: &FileRecord, full: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} [{}] {} ({})",
        record.name,
        record.folder_name,
        record.status,
        format_file_size(record.size)
    );

    if record.status == FileStatus::Error {
        let _ = writeln!(
            out,
            "  error: {}",
            record.error.as_deref().unwrap_or("Generic error")
        );
        return out;
    }

    if record.extracted_text.is_empty() {
        return out;
    }

    match record.document() {
        ExtractedDocument::Recognized(doc) if !full => {
            for (key, value) in doc.document_details.entries() {
                let _ = writeln!(out, "  {:<22} {}", key.replace('_', " "), value);
            }
            if let Some(pages) = record.pages.as_ref().filter(|p| p.len() > 1) {
                let _ = writeln!(out, "  multi-page document:");
                for page in pages {
                    let _ = writeln!(out, "    page {}: {}", page.page_number, truncate(&page.base64, 60));
                }
            }
            let _ = writeln!(
                out,
                "  category: {}",
                doc.document_category.as_deref().unwrap_or("-")
            );
        }
        _ => {
            let body = match serde_json::from_str::<Value>(&record.extracted_text) {
                Ok(value) => {
                    let shown = if full { value } else { truncate_long_strings(&value) };
                    serde_json::to_string_pretty(&shown)
                        .unwrap_or_else(|_| record.extracted_text.clone())
                }
                Err(_) => record.extracted_text.clone(),
            };
            for line in body.lines() {
                let _ = writeln!(out, "  {}", line);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PageImage;
    use serde_json::json;

    #[test]
    fn file_sizes() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(500), "500 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2 * 1024 * 1024), "2 MB");
        assert_eq!(format_file_size(1_234_567), "1.18 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024 * 1024), "5120 GB");
    }

    #[test]
    fn truncate_adds_ellipsis_only_when_needed() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }

    #[test]
    fn long_strings_are_shortened_recursively() {
        let long = format!("{}{}", "a".repeat(600), "z".repeat(600));
        let v = json!({"outer": {"list": [long.clone(), "short"]}, "n": 1});
        let t = truncate_long_strings(&v);
        let s = t["outer"]["list"][0].as_str().unwrap();
        assert_eq!(
            s,
            format!("{}... [TRUNCATED] ...{}", "a".repeat(50), "z".repeat(50))
        );
        assert_eq!(t["outer"]["list"][1], "short");
        assert_eq!(t["n"], 1);
    }

    fn completed(text: &str) -> FileRecord {
        let mut r = FileRecord::pending("licence.pdf", "Root", "application/pdf", 2048);
        r.status = FileStatus::Completed;
        r.extracted_text = text.to_string();
        r
    }

    #[test]
    fn recognized_record_shows_details() {
        let mut r = completed(
            r#"{"document_category":"Driving Licence","document_details":{"name":"Jane Doe","dl_no":"B123","address":null}}"#,
        );
        r.pages = Some(vec![
            PageImage {
                page_number: 1,
                base64: "A".repeat(80),
            },
            PageImage {
                page_number: 2,
                base64: "B".repeat(80),
            },
        ]);
        let out = render_record(&r, false);
        assert!(out.starts_with("licence.pdf [Root] completed (2 KB)"));
        assert!(out.contains("name"));
        assert!(out.contains("Jane Doe"));
        assert!(out.contains("dl no"));
        assert!(!out.contains("address"));
        assert!(out.contains("page 2: "));
        assert!(out.contains("category: Driving Licence"));
    }

    #[test]
    fn full_view_prints_json() {
        let r = completed(r#"{"document_category":"ID","document_details":{"name":"A"}}"#);
        let out = render_record(&r, true);
        assert!(out.contains("\"document_category\": \"ID\""));
    }

    #[test]
    fn raw_text_is_printed_as_is() {
        let r = completed("Extraction failed: timeout");
        assert!(render_record(&r, false).contains("Extraction failed: timeout"));
    }

    #[test]
    fn error_record_shows_message() {
        let mut r = FileRecord::pending("x.png", "Root", "image/png", 0);
        r.status = FileStatus::Error;
        let out = render_record(&r, false);
        assert!(out.contains("error: Generic error"));
    }
}
