//! Configuration types for batch extraction and base64 decoding.
//!
//! Batch behaviour is controlled through [`StudioConfig`], built via
//! [`StudioConfigBuilder`]. Decoding has its own small [`DecodeConfig`]
//! because the decoder never talks to a model or renders PDFs.

use crate::error::StudioError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Label used for files that were not selected through a folder.
pub const DEFAULT_ROOT_FOLDER: &str = "Root";

/// Configuration for a batch of files.
///
/// # Example
/// ```rust
/// use base64_studio::StudioConfig;
///
/// let config = StudioConfig::builder()
///     .model("gemini-2.5-flash")
///     .provider_name("gemini")
///     .render_scale(2.0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct StudioConfig {
    /// LLM model identifier, e.g. "gemini-2.5-flash", "gpt-4.1-mini".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Field extraction is transcription; low temperature keeps the model
    /// faithful to what is printed on the document.
    pub temperature: f32,

    /// Maximum tokens the model may generate per file. Default: 4096.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses the built-in extraction prompt.
    pub system_prompt: Option<String>,

    /// Per-extraction-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Upscale factor applied when rasterising PDF pages. Default: 2.0.
    pub render_scale: f32,

    /// Cap on either rendered page dimension in pixels. Default: 4000.
    ///
    /// A 2x render of an A0 poster would otherwise allocate hundreds of
    /// megabytes for a single page.
    pub max_rendered_pixels: u32,

    /// Directory holding the pdfium shared library. If None, reads
    /// `PDFIUM_LIB_PATH`, then falls back to the system library.
    pub pdfium_library_path: Option<PathBuf>,

    /// Characters of each page's base64 kept in the injected `pages` preview. Default: 100.
    pub page_preview_len: usize,

    /// Maximum characters of base64 written to the export's base64 column. Default: 32 000.
    ///
    /// Spreadsheet cells hold at most 32 767 characters.
    pub export_base64_max_len: usize,

    /// Folder label for files not selected through a folder. Default: "Root".
    pub root_folder_label: String,

    /// Optional per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            system_prompt: None,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            render_scale: 2.0,
            max_rendered_pixels: 4000,
            pdfium_library_path: None,
            page_preview_len: 100,
            export_base64_max_len: 32_000,
            root_folder_label: DEFAULT_ROOT_FOLDER.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for StudioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudioConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("render_scale", &self.render_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("page_preview_len", &self.page_preview_len)
            .field("export_base64_max_len", &self.export_base64_max_len)
            .field("root_folder_label", &self.root_folder_label)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl StudioConfig {
    /// Create a new builder for `StudioConfig`.
    pub fn builder() -> StudioConfigBuilder {
        StudioConfigBuilder {
            config: Self::default(),
        }
    }

    /// `pdfium_library_path`, else `PDFIUM_LIB_PATH`.
    pub fn resolved_pdfium_path(&self) -> Option<PathBuf> {
        self.pdfium_library_path.clone().or_else(|| {
            std::env::var("PDFIUM_LIB_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        })
    }
}

/// Builder for [`StudioConfig`].
pub struct StudioConfigBuilder {
    config: StudioConfig,
}

impl fmt::Debug for StudioConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudioConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl StudioConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.5, 4.0);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn page_preview_len(mut self, n: usize) -> Self {
        self.config.page_preview_len = n;
        self
    }

    pub fn export_base64_max_len(mut self, n: usize) -> Self {
        self.config.export_base64_max_len = n;
        self
    }

    pub fn root_folder_label(mut self, label: impl Into<String>) -> Self {
        self.config.root_folder_label = label.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StudioConfig, StudioError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 {
            return Err(StudioError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.export_base64_max_len > 32_767 {
            return Err(StudioError::InvalidConfig(format!(
                "Export base64 cap must fit a spreadsheet cell (≤ 32767), got {}",
                c.export_base64_max_len
            )));
        }
        if c.root_folder_label.trim().is_empty() {
            return Err(StudioError::InvalidConfig(
                "Root folder label must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Decoding ─────────────────────────────────────────────────────────────

/// What to do when a raw base64 payload matches no known signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnknownFormatPolicy {
    /// Treat it as PNG and let rendering decide. (default)
    #[default]
    AssumePng,
    /// Fail with [`crate::error::DecodeError::UnknownFormat`].
    Reject,
}

/// Settings for base64 decoding and the debounced auto-decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Quiet period after the last input change before auto-conversion. Default: 500 ms.
    pub quiet_period: Duration,

    /// Auto-conversion only runs for inputs longer than this many characters. Default: 20.
    pub min_auto_len: usize,

    /// Unknown-signature policy. Default: assume PNG.
    pub unknown_format: UnknownFormatPolicy,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(500),
            min_auto_len: 20,
            unknown_format: UnknownFormatPolicy::default(),
        }
    }
}
