//! Per-file pipeline stages.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the two external collaborators (pdfium, the vision model) sit
//! behind traits the batch processor can swap out.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm ──▶ postprocess
//! (path/URL) (pdfium)  (base64)  (VLM)   (merge)
//! ```
//!
//! 1. [`input`]: resolve files, folders and URLs into raw blobs
//! 2. [`render`]: split a PDF into page PNGs; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`encode`]: base64-wrap whole files and rendered pages
//! 4. [`llm`]: the extraction call; the only stage talking to a model
//! 5. [`postprocess`]: fence stripping, placeholder substitution and page
//!    preview injection

pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod render;
