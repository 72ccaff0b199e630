//! Configuration types for template filling.
//!
//! All behaviour is controlled through [`FillConfig`], built via its
//! [`FillConfigBuilder`]. One struct means one place to look when two runs
//! over the same inputs disagree.

use crate::assistant::ReportAssistant;
use crate::error::DocFillError;
use crate::progress::ProgressCallback;
use crate::template::Delimiters;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for one template-filling run.
///
/// Built via [`FillConfig::builder()`] or using [`FillConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docfill::FillConfig;
///
/// let config = FillConfig::builder()
///     .dpi(200)
///     .model("gemini-2.5-flash")
///     .provider_name("gemini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct FillConfig {
    /// Rendering DPI used when rasterising report pages. Range: 72–400. Default: 200.
    ///
    /// Photo reports are often phone scans with small print; 200 DPI keeps
    /// that legible for the vision model without blowing past upload limits.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// LLM model identifier, e.g. "gemini-2.5-flash", "gpt-4.1-mini".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed collaborator. Takes precedence over every provider setting.
    pub assistant: Option<Arc<dyn ReportAssistant>>,

    /// Sampling temperature for both AI calls. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts on a failed AI call. Default: 0.
    ///
    /// The provider client already applies its own transport-level policy;
    /// set this only when the endpoint is known to be flaky.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// User password for encrypted report PDFs.
    pub password: Option<String>,

    /// Custom OCR instruction. If None, uses [`crate::prompts::DEFAULT_OCR_PROMPT`].
    pub ocr_prompt: Option<String>,

    /// Placeholder delimiter pair. Default: `{{` / `}}`.
    pub delimiters: Delimiters,

    /// Re-scan the filled document and fail if any placeholder survived. Default: true.
    pub verify_output: bool,

    /// Download timeout for URL report inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 2000,
            model: None,
            provider_name: None,
            provider: None,
            assistant: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 0,
            retry_backoff_ms: 500,
            password: None,
            ocr_prompt: None,
            delimiters: Delimiters::default(),
            verify_output: true,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for FillConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FillConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field(
                "assistant",
                &self.assistant.as_ref().map(|_| "<dyn ReportAssistant>"),
            )
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("delimiters", &self.delimiters)
            .field("verify_output", &self.verify_output)
            .finish()
    }
}

impl FillConfig {
    /// Create a new builder for `FillConfig`.
    pub fn builder() -> FillConfigBuilder {
        FillConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`FillConfig`].
pub struct FillConfigBuilder {
    config: FillConfig,
}

impl FillConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

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

    pub fn assistant(mut self, assistant: Arc<dyn ReportAssistant>) -> Self {
        self.config.assistant = Some(assistant);
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

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn ocr_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.ocr_prompt = Some(prompt.into());
        self
    }

    pub fn delimiters(mut self, delimiters: Delimiters) -> Self {
        self.config.delimiters = delimiters;
        self
    }

    pub fn verify_output(mut self, v: bool) -> Self {
        self.config.verify_output = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<FillConfig, DocFillError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(DocFillError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.max_tokens == 0 {
            return Err(DocFillError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        c.delimiters.validate()?;
        Ok(self.config)
    }
}

impl fmt::Debug for FillConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FillConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}
