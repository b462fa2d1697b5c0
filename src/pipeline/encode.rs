//! Base64 encoding of whole files and rendered pages.
//!
//! Pages are PNG-encoded: lossless compression keeps small print crisp for
//! the vision model, where JPEG artefacts around glyphs hurt field accuracy.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Standard-alphabet, padded base64 of the raw bytes.
pub fn encode_bytes(bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} bytes → {} chars base64", bytes.len(), b64.len());
    b64
}

/// Encode a rasterised page as base64 PNG.
pub fn encode_page(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(encode_bytes(&buf))
}
