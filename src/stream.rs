//! Streaming OCR: emit page texts as they are read.
//!
//! Reading a stack of scanned reports takes a while. [`extract_stream`]
//! yields each page's text as soon as the vision model answers, so callers
//! can show the text to a reviewer or write it to disk while later pages are
//! still in flight. Pages are read one at a time and arrive in page order.

use crate::config::FillConfig;
use crate::error::DocFillError;
use crate::output::PageText;
use crate::pipeline::llm;
use crate::session::{ocr_page, rasterise_reports};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page texts.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageText, DocFillError>> + Send>>;

/// Render the reports and stream the text of every page.
///
/// # Returns
/// - `Ok(PageStream)` — one `Result<PageText, DocFillError>` per page
/// - `Err(DocFillError)` — fatal error before the first page (report not
///   found, not a PDF, provider not configured, …)
pub async fn extract_stream(
    reports: &[String],
    config: &FillConfig,
) -> Result<PageStream, DocFillError> {
    info!("Starting streaming extraction of {} report(s)", reports.len());

    let assistant = llm::resolve_assistant(config)?;
    let images = rasterise_reports(reports, config).await?;
    let total_pages = images.len();
    let config = config.clone();

    let s = stream::iter(images).then(move |page| {
        let assistant = Arc::clone(&assistant);
        let cfg = config.clone();
        async move { ocr_page(assistant.as_ref(), &page, total_pages, &cfg).await }
    });

    Ok(Box::pin(s))
}
