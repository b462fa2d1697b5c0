//! PDF page splitting: raw PDF bytes → one base64 PNG per page, via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and blocks for the whole render. `tokio::task::spawn_blocking` moves
//! the work onto the blocking pool so the runtime keeps serving the store and
//! progress consumers while a large document renders.
//!
//! ## Scale and cap
//!
//! Pages are rendered at a fixed upscale factor (2.0 by default) so small
//! print survives, with `max_rendered_pixels` bounding either dimension.

use crate::config::StudioConfig;
use crate::error::SplitError;
use crate::pipeline::encode;
use crate::record::PageImage;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Turns PDF bytes into an ordered list of page images.
#[async_trait]
pub trait PageSplitter: Send + Sync {
    /// Pages are returned in document order, numbered from 1.
    async fn split(&self, pdf: &[u8]) -> Result<Vec<PageImage>, SplitError>;
}

/// [`PageSplitter`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumSplitter {
    scale: f32,
    max_pixels: u32,
    library_path: Option<PathBuf>,
}

impl PdfiumSplitter {
    pub fn new(scale: f32, max_pixels: u32) -> Self {
        Self {
            scale,
            max_pixels,
            library_path: None,
        }
    }

    pub fn from_config(config: &StudioConfig) -> Self {
        Self {
            scale: config.render_scale,
            max_pixels: config.max_rendered_pixels,
            library_path: config.resolved_pdfium_path(),
        }
    }

    /// Load pdfium from this directory instead of the system library.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }
}

#[async_trait]
impl PageSplitter for PdfiumSplitter {
    async fn split(&self, pdf: &[u8]) -> Result<Vec<PageImage>, SplitError> {
        let bytes = pdf.to_vec();
        let scale = self.scale;
        let max_pixels = self.max_pixels;
        let library_path = self.library_path.clone();

        tokio::task::spawn_blocking(move || {
            split_blocking(&bytes, scale, max_pixels, library_path.as_deref())
        })
        .await
        .map_err(|e| SplitError::Task(e.to_string()))?
    }
}

fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, SplitError> {
    let bindings = match library_path {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| SplitError::Binding(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of page splitting.
fn split_blocking(
    bytes: &[u8],
    scale: f32,
    max_pixels: u32,
    library_path: Option<&Path>,
) -> Result<Vec<PageImage>, SplitError> {
    let pdfium = bind_pdfium(library_path)?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| SplitError::InvalidPdf(format!("{:?}", e)))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(pages.len() as usize);

    for (idx, page) in pages.iter().enumerate() {
        let page_number = idx as u32 + 1;

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| SplitError::RenderFailed {
                page: page_number,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_number,
            image.width(),
            image.height()
        );

        let base64 = encode::encode_page(&image).map_err(|e| SplitError::EncodeFailed {
            page: page_number,
            detail: e.to_string(),
        })?;

        results.push(PageImage {
            page_number,
            base64,
        });
    }

    if results.is_empty() {
        return Err(SplitError::NoPages);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_copies_render_settings() {
        let config = StudioConfig::builder()
            .render_scale(3.0)
            .max_rendered_pixels(2500)
            .pdfium_library_path("/opt/pdfium")
            .build()
            .unwrap();
        let splitter = PdfiumSplitter::from_config(&config);
        assert_eq!(splitter.scale, 3.0);
        assert_eq!(splitter.max_pixels, 2500);
        assert_eq!(splitter.library_path, Some(PathBuf::from("/opt/pdfium")));
    }

    #[tokio::test]
    async fn missing_library_is_a_binding_error() {
        let splitter =
            PdfiumSplitter::new(2.0, 4000).with_library_path("/definitely/not/a/pdfium/dir");
        let err = splitter.split(b"%PDF-1.4").await.unwrap_err();
        assert!(matches!(err, SplitError::Binding(_)), "got {err:?}");
    }
}
