//! Pipeline stages that feed the template engine.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm (OCR) ──▶ postprocess ──▶ llm (mapping)
//! (URL/path)  (pdfium)  (base64)   (vision)      (cleanup)       (JSON)
//! ```
//!
//! 1. [`input`]  — resolve each report path or URL to a local PDF
//! 2. [`render`] — rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`encode`] — PNG-encode and base64-wrap each page for the request body
//! 4. [`llm`]    — the provider-backed assistant and the retry loop; the only
//!    stage with network I/O besides URL downloads
//! 5. [`postprocess`] — deterministic cleanup of model responses

pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod render;
