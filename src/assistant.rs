//! The seam to the external AI service.
//!
//! Both AI calls of a run, page OCR and field mapping, go through one
//! [`ReportAssistant`]. The default implementation,
//! [`crate::pipeline::llm::LlmAssistant`], talks to an `edgequake-llm`
//! provider; tests and embedders can supply their own.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use edgequake_docfill::{AssistantError, AssistantReply, PageImage, ReportAssistant};
//!
//! struct Canned;
//!
//! #[async_trait]
//! impl ReportAssistant for Canned {
//!     async fn extract_text(&self, _page: &PageImage) -> Result<AssistantReply, AssistantError> {
//!         Ok(AssistantReply::text("Name: Jane Roe"))
//!     }
//!
//!     async fn map_fields(
//!         &self,
//!         _placeholders: &[String],
//!         _corpus: &str,
//!     ) -> Result<AssistantReply, AssistantError> {
//!         Ok(AssistantReply::text(r#"{"CLIENT_NAME": "Jane Roe"}"#))
//!     }
//! }
//! ```

use crate::error::AssistantError;
use crate::output::PageImage;
use async_trait::async_trait;

/// What the service answered, with token usage when it reports any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantReply {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl AssistantReply {
    /// A reply with no usage information.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// OCR and field mapping, as one collaborator.
#[async_trait]
pub trait ReportAssistant: Send + Sync {
    /// Read the text on one page image. An empty answer is valid.
    async fn extract_text(&self, page: &PageImage) -> Result<AssistantReply, AssistantError>;

    /// Given placeholder names and the combined report text, answer with a
    /// JSON object mapping each name to a value.
    async fn map_fields(
        &self,
        placeholders: &[String],
        corpus: &str,
    ) -> Result<AssistantReply, AssistantError>;

    /// Short label for logs and run summaries.
    fn name(&self) -> String {
        "custom".to_string()
    }
}
