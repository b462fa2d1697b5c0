//! Extraction client: document image(s) → JSON text via a vision model.
//!
//! The pipeline only sees the [`Extractor`] trait. [`VlmExtractor`] is the
//! production implementation on top of an edgequake-llm provider; tests plug
//! in their own.
//!
//! ## Message Layout
//!
//! 1. **System message**: the extraction persona (or a user override)
//! 2. **User message**: the field-extraction instructions, with every image
//!    attached in page order
//!
//! There is no retry loop. A failed call surfaces as [`ExtractionError`] and
//! the pipeline records it inline on the file.

use crate::config::StudioConfig;
use crate::error::{ExtractionError, StudioError};
use crate::pipeline::postprocess;
use crate::prompts::{extraction_instructions, DEFAULT_SYSTEM_PROMPT};
use crate::record::PageImage;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default models used when a provider is picked from an API key alone.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";

/// What is sent to the model for one file.
#[derive(Debug, Clone, Copy)]
pub enum ExtractionInput<'a> {
    /// Whole-file base64 payload.
    Single(&'a str),
    /// Rendered PDF pages, in order.
    Pages(&'a [PageImage]),
}

impl ExtractionInput<'_> {
    pub fn image_count(&self) -> usize {
        match self {
            ExtractionInput::Single(_) => 1,
            ExtractionInput::Pages(pages) => pages.len(),
        }
    }
}

/// Sends one file's image(s) to an extraction service.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Returns the model's JSON text. `mime_type` is the file's declared type.
    async fn extract(
        &self,
        input: ExtractionInput<'_>,
        mime_type: &str,
    ) -> Result<String, ExtractionError>;
}

/// [`Extractor`] backed by an edgequake-llm vision provider.
#[derive(Clone)]
pub struct VlmExtractor {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    system_prompt: Option<String>,
    api_timeout_secs: u64,
}

impl std::fmt::Debug for VlmExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VlmExtractor")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl VlmExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &StudioConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve a provider from the config (see [`resolve_provider`]) and wrap it.
    pub fn from_config(config: &StudioConfig) -> Result<Self, StudioError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    fn build_messages(&self, input: ExtractionInput<'_>, mime_type: &str) -> Vec<ChatMessage> {
        let system_prompt = self
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);

        vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user_with_images(extraction_instructions(), build_images(input, mime_type)),
        ]
    }
}

#[async_trait]
impl Extractor for VlmExtractor {
    async fn extract(
        &self,
        input: ExtractionInput<'_>,
        mime_type: &str,
    ) -> Result<String, ExtractionError> {
        let start = Instant::now();
        let messages = self.build_messages(input, mime_type);
        let options = build_options(self.temperature, self.max_tokens);

        let call = self.provider.chat(&messages, Some(&options));
        let response = tokio::time::timeout(Duration::from_secs(self.api_timeout_secs), call)
            .await
            .map_err(|_| {
                warn!("Extraction call exceeded {}s", self.api_timeout_secs);
                ExtractionError::Timeout {
                    secs: self.api_timeout_secs,
                }
            })?
            .map_err(|e| ExtractionError::Api(e.to_string()))?;

        debug!(
            "Extraction: {} image(s), {} input tokens, {} output tokens, {:?}",
            input.image_count(),
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(normalize_response(&response.content))
    }
}

/// Attach the payload(s) as images. Pages are always PNG; a single payload
/// carries the file's declared type.
fn build_images(input: ExtractionInput<'_>, mime_type: &str) -> Vec<ImageData> {
    match input {
        ExtractionInput::Single(b64) => {
            vec![ImageData::new(b64.to_string(), mime_type).with_detail("high")]
        }
        ExtractionInput::Pages(pages) => pages
            .iter()
            .map(|p| ImageData::new(p.base64.clone(), "image/png").with_detail("high"))
            .collect(),
    }
}

fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

/// Empty output becomes `{}`; surrounding code fences are removed.
fn normalize_response(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return "{}".to_string();
    }
    postprocess::strip_json_fences(trimmed)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, StudioError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        StudioError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **`GEMINI_API_KEY`** → gemini, then **`OPENAI_API_KEY`** → openai.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &StudioConfig) -> Result<Arc<dyn LLMProvider>, StudioError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config
            .model
            .as_deref()
            .unwrap_or_else(|| default_model_for(name));
        return create_vision_provider(name, model);
    }

    if let (Some(prov), Some(model)) = (
        non_empty_env("EDGEQUAKE_LLM_PROVIDER"),
        non_empty_env("EDGEQUAKE_MODEL"),
    ) {
        return create_vision_provider(&prov, &model);
    }

    if non_empty_env("GEMINI_API_KEY").is_some() {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        return create_vision_provider("gemini", model);
    }

    if non_empty_env("OPENAI_API_KEY").is_some() {
        let model = config.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL);
        return create_vision_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| StudioError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn default_model_for(provider_name: &str) -> &'static str {
    match provider_name {
        "gemini" | "google" => DEFAULT_GEMINI_MODEL,
        _ => DEFAULT_OPENAI_MODEL,
    }
}
