//! Provider-backed assistant: build messages and call the model.
//!
//! This module is intentionally thin. Prompt text lives in
//! [`crate::prompts`]; this file only turns a page image or a mapping request
//! into chat messages, and resolves which provider to talk to.
//!
//! ## Retry Strategy
//!
//! No retries by default. When `max_retries > 0`, a failed call is retried
//! after `retry_backoff_ms * 2^attempt`: with 500 ms base and 3 retries the
//! wait sequence is 500 ms → 1 s → 2 s.

use crate::assistant::{AssistantReply, ReportAssistant};
use crate::config::FillConfig;
use crate::error::{AssistantError, DocFillError};
use crate::output::PageImage;
use crate::prompts::{mapping_request, DEFAULT_OCR_PROMPT, MAPPING_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Default model when a provider is chosen without one.
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";

/// [`ReportAssistant`] backed by an `edgequake-llm` provider.
pub struct LlmAssistant {
    provider: Arc<dyn LLMProvider>,
    label: String,
    ocr_prompt: String,
    options: CompletionOptions,
}

impl LlmAssistant {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &FillConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            ocr_prompt: config
                .ocr_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_OCR_PROMPT.to_string()),
            options: build_options(config),
        }
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<AssistantReply, AssistantError> {
        let response = self
            .provider
            .chat(messages, Some(&self.options))
            .await
            .map_err(|e| AssistantError::new(e.to_string()))?;

        Ok(AssistantReply {
            content: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

#[async_trait]
impl ReportAssistant for LlmAssistant {
    /// ## Message Layout
    ///
    /// 1. **System message** — the OCR instruction (or the configured override)
    /// 2. **User message** — the page PNG as a base64 attachment, empty text
    async fn extract_text(&self, page: &PageImage) -> Result<AssistantReply, AssistantError> {
        let messages = vec![
            ChatMessage::system(self.ocr_prompt.as_str()),
            ChatMessage::user_with_images("", vec![page.image.clone()]),
        ];
        self.chat(&messages).await
    }

    async fn map_fields(
        &self,
        placeholders: &[String],
        corpus: &str,
    ) -> Result<AssistantReply, AssistantError> {
        let messages = vec![
            ChatMessage::system(MAPPING_SYSTEM_PROMPT),
            ChatMessage::user(mapping_request(placeholders, corpus)),
        ];
        self.chat(&messages).await
    }

    fn name(&self) -> String {
        self.label.clone()
    }
}

/// Build `CompletionOptions` from the fill config.
fn build_options(config: &FillConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Run `call` until it succeeds or `max_retries` retries are spent.
///
/// Returns the value with the number of retries used, or the last error with
/// the number of attempts made.
pub(crate) async fn with_retries<T, F, Fut>(
    config: &FillConfig,
    what: &str,
    mut call: F,
) -> Result<(T, u32), (AssistantError, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AssistantError>>,
{
    let mut last_err = AssistantError::new("no attempt made");

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                what, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match call().await {
            Ok(value) => return Ok((value, attempt)),
            Err(e) => {
                warn!("{}: attempt {} failed — {}", what, attempt + 1, e);
                last_err = e;
            }
        }
    }

    Err((last_err, config.max_retries.saturating_add(1)))
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// saturating at `u64::MAX`.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Resolve the assistant, from most-specific to least-specific.
///
/// 1. **Pre-built assistant** (`config.assistant`) — used as-is.
/// 2. **Pre-built provider** (`config.provider`) — wrapped in [`LlmAssistant`].
/// 3. **Named provider + model** (`config.provider_name`).
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **Gemini key** (`GEMINI_API_KEY`) with `gemini-2.5-flash`.
/// 6. **OpenAI key** (`OPENAI_API_KEY`).
/// 7. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_assistant(config: &FillConfig) -> Result<Arc<dyn ReportAssistant>, DocFillError> {
    if let Some(ref assistant) = config.assistant {
        return Ok(Arc::clone(assistant));
    }

    let (provider, label) = resolve_provider(config)?;
    info!("Using LLM provider {}", label);
    Ok(Arc::new(LlmAssistant::new(provider, label, config)))
}

fn resolve_provider(config: &FillConfig) -> Result<(Arc<dyn LLMProvider>, String), DocFillError> {
    if let Some(ref provider) = config.provider {
        let label = config.model.clone().unwrap_or_else(|| "custom".to_string());
        return Ok((Arc::clone(provider), label));
    }

    if let Some(ref name) = config.provider_name {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| default_model_for(name).to_string());
        return create_provider(name, &model);
    }

    if let (Some(prov), Some(model)) = (non_empty_env("EDGEQUAKE_LLM_PROVIDER"), non_empty_env("EDGEQUAKE_MODEL")) {
        return create_provider(&prov, &model);
    }

    if non_empty_env("GEMINI_API_KEY").is_some() {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        return create_provider("gemini", model);
    }

    if non_empty_env("OPENAI_API_KEY").is_some() {
        let model = config.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL);
        return create_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocFillError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY or OPENAI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;
    debug!("Provider auto-detected from environment");
    Ok((llm_provider, "auto".to_string()))
}

fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<(Arc<dyn LLMProvider>, String), DocFillError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocFillError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok((provider, format!("{provider_name}/{model}")))
}

fn default_model_for(provider_name: &str) -> &'static str {
    match provider_name {
        "openai" | "azure" => DEFAULT_OPENAI_MODEL,
        _ => DEFAULT_GEMINI_MODEL,
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
