//! Error types for the edgequake-docfill library.
//!
//! Two error types reflect two distinct layers:
//!
//! * [`DocFillError`] — **Fatal**: the run stops at the failing stage. Every
//!   variant belongs to one [`ErrorKind`] so callers (and the CLI) can tell a
//!   bad upload from a flaky AI service from a template the engine could not
//!   rewrite safely.
//!
//! * [`AssistantError`] — raised by a [`crate::assistant::ReportAssistant`]
//!   implementation. It carries no stage context; the pipeline wraps it into
//!   [`DocFillError::OcrFailed`] or [`DocFillError::MappingFailed`].
//!
//! Artifacts gathered before a failing stage are kept in the
//! [`crate::session::Session`] so the caller can inspect partial results.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`DocFillError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// The caller supplied something unusable (template, reports).
    Input,
    /// The OCR or mapping collaborator failed or answered garbage.
    ExternalService,
    /// A placeholder could not be mapped onto the document's runs.
    Resolution,
    /// Configuration, I/O or runtime failures unrelated to the inputs.
    Internal,
}

/// All fatal errors returned by the edgequake-docfill library.
#[derive(Debug, Error)]
pub enum DocFillError {
    // ── Template errors ───────────────────────────────────────────────────
    /// Template file was not found at the given path.
    #[error("Template not found: '{path}'\nCheck the path exists and is readable.")]
    TemplateNotFound { path: PathBuf },

    /// The template is not a zip container, so it cannot be a DOCX file.
    #[error("Template is not a DOCX file (first bytes: {magic:?})")]
    NotADocx { magic: [u8; 4] },

    /// The DOCX zip or one of its XML parts could not be read.
    #[error("Invalid DOCX template: {detail}")]
    InvalidTemplate { detail: String },

    /// The template contains no well-formed placeholder tokens.
    #[error("Template has no placeholders of the form {open}NAME{close}")]
    NoPlaceholders { open: String, close: String },

    // ── Report errors ─────────────────────────────────────────────────────
    /// Report file was not found at the given path.
    #[error("Report not found: '{path}'\nCheck the path exists and is readable.")]
    ReportNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page} of '{path}': {detail}")]
    RasterisationFailed {
        path: PathBuf,
        page: usize,
        detail: String,
    },

    /// Every report was read but not a single page image came out.
    #[error("No report pages could be converted to images ({reports} report(s) given)")]
    NoPagesConverted { reports: usize },

    // ── External service errors ───────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Text extraction failed for a page.
    #[error("Text extraction failed on page {page} after {attempts} attempt(s): {detail}")]
    OcrFailed {
        page: usize,
        attempts: u32,
        detail: String,
    },

    /// The mapping call itself failed.
    #[error("Field mapping failed after {attempts} attempt(s): {detail}")]
    MappingFailed { attempts: u32, detail: String },

    /// The mapping call answered, but not with a JSON object.
    #[error("Field mapping response is not a JSON object: {detail}\nResponse: {response}")]
    MalformedMapping { detail: String, response: String },

    // ── Resolution errors ─────────────────────────────────────────────────
    /// A placeholder occurrence could not be mapped onto runs.
    #[error("Cannot resolve '{placeholder}' in {part} ({container} {paragraph}): {detail}")]
    UnresolvedSpan {
        part: String,
        container: &'static str,
        paragraph: usize,
        placeholder: String,
        detail: String,
    },

    /// The filled document still contains placeholder tokens.
    #[error("Filled document still contains placeholders: {}", names.join(", "))]
    PlaceholdersRemain { names: Vec<String> },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium system-wide, or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocFillError {
    /// Which family of failure this is.
    pub fn kind(&self) -> ErrorKind {
        use DocFillError::*;
        match self {
            TemplateNotFound { .. }
            | NotADocx { .. }
            | InvalidTemplate { .. }
            | NoPlaceholders { .. }
            | ReportNotFound { .. }
            | PermissionDenied { .. }
            | DownloadFailed { .. }
            | DownloadTimeout { .. }
            | NotAPdf { .. }
            | CorruptPdf { .. }
            | PasswordRequired { .. }
            | WrongPassword { .. }
            | RasterisationFailed { .. }
            | NoPagesConverted { .. } => ErrorKind::Input,
            ProviderNotConfigured { .. }
            | OcrFailed { .. }
            | MappingFailed { .. }
            | MalformedMapping { .. } => ErrorKind::ExternalService,
            UnresolvedSpan { .. } | PlaceholdersRemain { .. } => ErrorKind::Resolution,
            OutputWriteFailed { .. }
            | InvalidConfig(_)
            | PdfiumBindingFailed(_)
            | Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid_template(detail: impl std::fmt::Display) -> Self {
        DocFillError::InvalidTemplate {
            detail: detail.to_string(),
        }
    }
}

/// Failure reported by a [`crate::assistant::ReportAssistant`].
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct AssistantError {
    pub message: String,
}

impl AssistantError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
