//! # edgequake-docfill
//!
//! Fill DOCX templates from scanned PDF reports using Vision Language Models.
//!
//! ## Why this crate?
//!
//! Insurance and medical paperwork often arrives as scanned PDFs while the
//! letter that has to be written from it is a Word template full of
//! `{{CLIENT_NAME}}`-style tokens. This crate reads the reports with a vision
//! model, asks a language model which value belongs to which token, and
//! writes the filled document, keeping the template's formatting intact even
//! when Word has split a token across several differently formatted runs.
//!
//! ## Pipeline Overview
//!
//! ```text
//! DOCX template                 PDF reports
//!  │                              │
//!  ├─ 1. Scan    distinct tokens  ├─ 2. Input   local files or URLs
//!  │                              ├─ 3. Render  pdfium, spawn_blocking
//!  │                              ├─ 4. Encode  PNG → base64 ImageData
//!  │                              ├─ 5. OCR     one VLM call per page
//!  │                              └─ 6. Corpus  "--- Page N ---" blocks
//!  │                                     │
//!  └──────────── 7. Mapping  one LLM call → {token: value} JSON
//!                 8. Fill    run-span resolver + substitution
//!                 9. Verify  no token left behind
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docfill::{autofill_to_file, FillConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = FillConfig::default();
//!     let reports = vec!["claim.pdf".to_string()];
//!     let output = autofill_to_file("template.docx", &reports, "filled.docx", &config).await?;
//!     eprintln!("{} of {} placeholders filled",
//!         output.stats.mapped,
//!         output.stats.placeholders);
//!     Ok(())
//! }
//! ```
//!
//! The template engine works without any AI service:
//!
//! ```rust,no_run
//! use edgequake_docfill::{Delimiters, Mapping, Template};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let template = Template::open("template.docx")?;
//! let delims = Delimiters::default();
//! println!("{:?}", template.placeholders(&delims)?);
//!
//! let mapping: Mapping = [("CLIENT_NAME", "Jane Doe")].into_iter().collect();
//! let filled = template.fill(&mapping, &delims)?;
//! std::fs::write("filled.docx", &filled.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docfill` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-docfill = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assistant;
pub mod autofill;
pub mod config;
pub mod error;
pub mod mapping;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod stream;
pub mod template;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assistant::{AssistantReply, ReportAssistant};
pub use autofill::{
    autofill, autofill_sync, autofill_to_file, fill_with_mapping, scan_template, write_atomic,
};
pub use config::{FillConfig, FillConfigBuilder};
pub use error::{AssistantError, DocFillError, ErrorKind};
pub use mapping::{build_corpus, parse_mapping_response, Mapping};
pub use output::{FillOutput, PageImage, PageText, RunStats};
pub use pipeline::llm::{resolve_assistant, LlmAssistant};
pub use progress::{FillProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use session::{RunArtifacts, Session};
pub use stream::{extract_stream, PageStream};
pub use template::{Delimiters, FillReport, FilledDocument, Template};
