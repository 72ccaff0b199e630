//! Progress-callback trait for run events.
//!
//! Inject an [`Arc<dyn FillProgressCallback>`] via
//! [`crate::config::FillConfigBuilder::progress_callback`] to receive events
//! as the run moves through its stages and OCRs each page.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docfill::{FillConfig, FillProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     pages: AtomicUsize,
//! }
//!
//! impl FillProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} read ({} bytes)", page_num, total_pages, text_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { pages: AtomicUsize::new(0) });
//!
//! let config = FillConfig::builder()
//!     .progress_callback(counter as Arc<dyn FillProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// The stages of one run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Scan,
    Render,
    Ocr,
    Mapping,
    Fill,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Scan => "scanning template",
            Stage::Render => "rendering reports",
            Stage::Ocr => "extracting text",
            Stage::Mapping => "mapping fields",
            Stage::Fill => "filling template",
        };
        f.write_str(s)
    }
}

/// Called by the pipeline as a run progresses.
///
/// Pages are OCRed one at a time, so calls never overlap. All methods have
/// default no-op implementations so callers only override what they care
/// about.
pub trait FillProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes without error.
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called just before the OCR request is sent for a page.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number across all reports
    /// * `total_pages` — total pages across all reports
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page's text came back.
    ///
    /// # Arguments
    /// * `text_len` — byte length of the cleaned text (0 for blank pages)
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when a page's OCR failed after all retries; the run stops.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after the filled document has been produced.
    ///
    /// # Arguments
    /// * `placeholders` — distinct placeholders in the template
    /// * `occurrences`  — placeholder occurrences replaced
    fn on_run_complete(&self, placeholders: usize, occurrences: usize) {
        let _ = (placeholders, occurrences);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl FillProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::FillConfig`].
pub type ProgressCallback = Arc<dyn FillProgressCallback>;
