//! Result types produced by a fill run.

use crate::mapping::Mapping;
use crate::template::FillReport;
use edgequake_llm::ImageData;
use serde::Serialize;
use std::fmt;

/// One rasterised report page, ready for the vision model.
#[derive(Clone)]
pub struct PageImage {
    /// 1-indexed page number, counted across all reports in input order.
    pub page_num: usize,
    /// The report this page came from (path or URL as given).
    pub source: String,
    /// 1-indexed page number inside `source`.
    pub source_page: usize,
    pub width: u32,
    pub height: u32,
    /// Base64 PNG payload.
    pub image: ImageData,
}

impl fmt::Debug for PageImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageImage")
            .field("page_num", &self.page_num)
            .field("source", &self.source)
            .field("source_page", &self.source_page)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("base64_len", &self.image.data.len())
            .finish()
    }
}

/// Text extracted from one page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageText {
    pub page_num: usize,
    /// Extracted text, possibly empty.
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Retries needed before the call succeeded.
    pub retries: u32,
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub reports: usize,
    pub pages: usize,
    pub placeholders: usize,
    /// Placeholders that received a non-empty value.
    pub mapped: usize,
    pub occurrences: usize,
    pub multi_run_occurrences: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub render_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub mapping_duration_ms: u64,
    pub fill_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct FillOutput {
    /// The filled DOCX.
    #[serde(skip)]
    pub document: Vec<u8>,
    /// Placeholder names found in the template, sorted.
    pub placeholders: Vec<String>,
    pub mapping: Mapping,
    /// Combined text of every page, as sent to the mapping call.
    pub corpus: String,
    pub pages: Vec<PageText>,
    pub report: FillReport,
    pub stats: RunStats,
}
