//! Base64 → viewable resource: MIME sniffing, data-URI parsing, preview.
//!
//! Decoding is best-effort and two-phase:
//!
//! 1. [`decode_input`] only looks at the text. It strips whitespace, honours
//!    an explicit `data:<mime>;base64,` prefix, and otherwise sniffs the MIME
//!    type from the payload's leading characters. The payload is not
//!    validated here.
//! 2. [`DecodedResource::render`] actually decodes the bytes (and, for raster
//!    images, the image). A bad payload is detected at this point and reported
//!    as [`DecodeError::InvalidFormat`].

use crate::config::UnknownFormatPolicy;
use crate::error::DecodeError;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Leading base64 characters of well-known file signatures, checked in order.
pub const MAGIC_PREFIXES: &[(&str, &str)] = &[
    ("iVBORw0KGgo", "image/png"),
    ("/9j/", "image/jpeg"),
    ("JVBERi0", "application/pdf"),
    ("R0lGOD", "image/gif"),
    ("UklGR", "image/webp"),
];

/// MIME type assumed when nothing matches.
pub const FALLBACK_MIME: &str = "image/png";

/// Base name of downloaded files.
pub const DOWNLOAD_BASENAME: &str = "converted-file";

static RE_DATA_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:([^;]+);base64,(.+)$").unwrap());

// Accepts payloads with or without trailing padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// What started a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Explicit user request; empty input is an error.
    Manual,
    /// Debounced conversion after typing stops; empty input is ignored.
    Auto,
}

/// How the MIME type was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MimeSource {
    DataUri,
    Sniffed,
    Assumed,
}

/// MIME type of the first matching signature.
pub fn sniff_mime(payload: &str) -> Option<&'static str> {
    MAGIC_PREFIXES
        .iter()
        .find(|(prefix, _)| payload.starts_with(prefix))
        .map(|(_, mime)| *mime)
}

/// A base64 payload with its resolved MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedResource {
    pub mime_type: String,
    /// Whitespace-free base64, without any data-URI prefix.
    pub payload: String,
    pub source: MimeSource,
}

impl DecodedResource {
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.payload)
    }

    /// MIME subtype, used as the file extension.
    pub fn extension(&self) -> &str {
        self.mime_type
            .split('/')
            .nth(1)
            .filter(|s| !s.is_empty())
            .unwrap_or("png")
    }

    /// `converted-file.<ext>`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", DOWNLOAD_BASENAME, self.extension())
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Decode the payload bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DecodeError> {
        LENIENT
            .decode(self.payload.as_bytes())
            .map_err(|e| DecodeError::InvalidFormat {
                detail: e.to_string(),
            })
    }

    /// Decode the payload and, for raster images, the image itself.
    pub fn render(&self) -> Result<Preview, DecodeError> {
        let bytes = self.to_bytes()?;

        let kind = if self.is_image() && self.mime_type != "image/svg+xml" {
            let img = image::load_from_memory(&bytes).map_err(|e| DecodeError::InvalidFormat {
                detail: e.to_string(),
            })?;
            PreviewKind::Image {
                width: img.width(),
                height: img.height(),
            }
        } else {
            PreviewKind::Document
        };

        debug!(
            "Rendered {} ({} bytes, {:?})",
            self.mime_type,
            bytes.len(),
            kind
        );

        Ok(Preview {
            resource: self.clone(),
            bytes,
            kind,
        })
    }
}

/// What a rendered resource turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PreviewKind {
    Image { width: u32, height: u32 },
    /// PDFs and other non-raster payloads, shown through an embedded viewer.
    Document,
}

/// A successfully rendered resource, ready to display or download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub resource: DecodedResource,
    pub bytes: Vec<u8>,
    pub kind: PreviewKind,
}

/// Parse user input into a [`DecodedResource`].
///
/// Returns `Ok(None)` for empty input on the [`Trigger::Auto`] path.
pub fn decode_input(
    input: &str,
    trigger: Trigger,
    policy: UnknownFormatPolicy,
) -> Result<Option<DecodedResource>, DecodeError> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        return match trigger {
            Trigger::Manual => Err(DecodeError::Empty),
            Trigger::Auto => Ok(None),
        };
    }

    if let Some(caps) = RE_DATA_URI.captures(&cleaned) {
        return Ok(Some(DecodedResource {
            mime_type: caps[1].to_string(),
            payload: caps[2].to_string(),
            source: MimeSource::DataUri,
        }));
    }

    let (mime_type, source) = match sniff_mime(&cleaned) {
        Some(mime) => (mime, MimeSource::Sniffed),
        None => match policy {
            UnknownFormatPolicy::AssumePng => (FALLBACK_MIME, MimeSource::Assumed),
            UnknownFormatPolicy::Reject => {
                return Err(DecodeError::UnknownFormat {
                    prefix: cleaned.chars().take(12).collect(),
                })
            }
        },
    };

    Ok(Some(DecodedResource {
        mime_type: mime_type.to_string(),
        payload: cleaned,
        source,
    }))
}

/// [`decode_input`] followed by [`DecodedResource::render`].
pub fn convert(
    input: &str,
    trigger: Trigger,
    policy: UnknownFormatPolicy,
) -> Result<Option<Preview>, DecodeError> {
    decode_input(input, trigger, policy)?
        .map(|res| res.render())
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::{encode_bytes, encode_page};
    use image::{DynamicImage, Rgba, RgbaImage};

    fn tiny_png_b64() -> String {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 2, Rgba([0, 0, 255, 255])));
        encode_page(&img).unwrap()
    }

    fn decode(input: &str) -> DecodedResource {
        decode_input(input, Trigger::Manual, UnknownFormatPolicy::AssumePng)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn data_uri_takes_precedence() {
        let res = decode("data:image/png;base64,JVBERi0xLjQ=");
        assert_eq!(res.mime_type, "image/png");
        assert_eq!(res.payload, "JVBERi0xLjQ=");
        assert_eq!(res.source, MimeSource::DataUri);
    }

    #[test]
    fn sniffs_known_prefixes() {
        assert_eq!(decode("iVBORw0KGgoAAAA").mime_type, "image/png");
        assert_eq!(decode("JVBERi0xLjQK").mime_type, "application/pdf");
        assert_eq!(decode("/9j/4AAQ").mime_type, "image/jpeg");
        assert_eq!(decode("R0lGODlh").mime_type, "image/gif");
        assert_eq!(decode("UklGRiQA").mime_type, "image/webp");
    }

    #[test]
    fn whitespace_is_stripped() {
        let res = decode("  JVBE\nRi0x\r\n LjQK \t");
        assert_eq!(res.payload, "JVBERi0xLjQK");
        assert_eq!(res.mime_type, "application/pdf");
    }

    #[test]
    fn unknown_prefix_defaults_to_png() {
        let res = decode("QUJDREVGRw==");
        assert_eq!(res.mime_type, "image/png");
        assert_eq!(res.source, MimeSource::Assumed);
    }

    #[test]
    fn unknown_prefix_rejected_when_strict() {
        let err = decode_input("QUJDREVGRw==", Trigger::Manual, UnknownFormatPolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnknownFormat { .. }));
    }

    #[test]
    fn empty_input_by_trigger() {
        let policy = UnknownFormatPolicy::AssumePng;
        assert_eq!(
            decode_input(" \n ", Trigger::Manual, policy),
            Err(DecodeError::Empty)
        );
        assert_eq!(decode_input("", Trigger::Auto, policy), Ok(None));
    }

    #[test]
    fn download_name_uses_subtype() {
        assert_eq!(decode("JVBERi0xLjQK").file_name(), "converted-file.pdf");
        assert_eq!(decode("/9j/4AAQ").file_name(), "converted-file.jpeg");
    }

    #[test]
    fn render_png_reports_dimensions() {
        let preview = convert(&tiny_png_b64(), Trigger::Manual, UnknownFormatPolicy::AssumePng)
            .unwrap()
            .unwrap();
        assert_eq!(preview.kind, PreviewKind::Image { width: 3, height: 2 });
        assert!(preview.resource.data_uri().starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn render_pdf_is_document() {
        let b64 = encode_bytes(b"%PDF-1.4\n%%EOF");
        let preview = convert(&b64, Trigger::Manual, UnknownFormatPolicy::AssumePng)
            .unwrap()
            .unwrap();
        assert_eq!(preview.kind, PreviewKind::Document);
        assert_eq!(preview.bytes, b"%PDF-1.4\n%%EOF");
    }

    #[test]
    fn render_detects_garbage() {
        // PNG signature prefix but truncated image data.
        let err = convert("iVBORw0KGgoAAAA", Trigger::Manual, UnknownFormatPolicy::AssumePng)
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidFormat { .. }));

        let err = convert("not*base64!", Trigger::Manual, UnknownFormatPolicy::AssumePng)
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid base64 string format.");
    }

    fn data_uri_for(format: image::ImageFormat, mime: &str) -> String {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(2, 3, image::Rgb([200, 10, 10])));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), format).unwrap();
        format!("data:{};base64,{}", mime, encode_bytes(&buf))
    }

    #[test]
    fn render_bmp_and_tiff() {
        for (format, mime) in [
            (image::ImageFormat::Bmp, "image/bmp"),
            (image::ImageFormat::Tiff, "image/tiff"),
        ] {
            let preview = convert(&data_uri_for(format, mime), Trigger::Manual, UnknownFormatPolicy::Reject)
                .unwrap()
                .unwrap();
            assert_eq!(preview.kind, PreviewKind::Image { width: 2, height: 3 }, "{mime}");
            assert_eq!(preview.resource.file_name(), format!("converted-file.{}", &mime[6..]));
        }
    }

    #[test]
    fn unpadded_payload_decodes() {
        let res = decode("data:application/pdf;base64,JVBERi0xLjQ");
        assert_eq!(res.to_bytes().unwrap(), b"%PDF-1.4");
    }
}
