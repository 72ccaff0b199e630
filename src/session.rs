//! The pipeline orchestrator.
//!
//! A [`Session`] owns the configuration, the resolved assistant and the
//! [`RunArtifacts`] of the latest run. Every run starts by resetting the
//! artifacts, and each stage stores its result as soon as it has one, so
//! after a failure the caller can still look at what the earlier stages
//! produced (the page texts when mapping failed, the mapping when filling
//! failed).
//!
//! ```text
//! template ──▶ scan ─┐
//! reports ──▶ render ─┴▶ OCR ──▶ corpus ──▶ mapping ──▶ fill ──▶ verify
//! ```

use crate::assistant::ReportAssistant;
use crate::config::FillConfig;
use crate::error::DocFillError;
use crate::mapping::{build_corpus, parse_mapping_response, Mapping};
use crate::output::{FillOutput, PageImage, PageText, RunStats};
use crate::pipeline::{encode, input, llm, postprocess, render};
use crate::progress::{FillProgressCallback, Stage};
use crate::template::{FillReport, Template};
use std::collections::BTreeSet;
use std::io::{Read, Seek};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Everything one run has produced so far.
#[derive(Debug, Clone, Default)]
pub struct RunArtifacts {
    pub images: Vec<PageImage>,
    pub pages: Vec<PageText>,
    pub corpus: Option<String>,
    pub placeholders: Option<BTreeSet<String>>,
    pub mapping: Option<Mapping>,
    pub document: Option<Vec<u8>>,
    pub report: Option<FillReport>,
    pub stats: RunStats,
}

impl RunArtifacts {
    /// Drop everything from the previous run.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The combined text, or, when OCR stopped early, the text of the pages
    /// read before the failure. `None` when no page was read.
    pub fn corpus_so_far(&self) -> Option<String> {
        match &self.corpus {
            Some(corpus) => Some(corpus.clone()),
            None if !self.pages.is_empty() => Some(build_corpus(&self.pages)),
            None => None,
        }
    }
}

/// Runs the fill pipeline; reusable across runs.
pub struct Session {
    config: FillConfig,
    assistant: Option<Arc<dyn ReportAssistant>>,
    artifacts: RunArtifacts,
}

impl Session {
    pub fn new(config: FillConfig) -> Self {
        Self {
            config,
            assistant: None,
            artifacts: RunArtifacts::default(),
        }
    }

    pub fn config(&self) -> &FillConfig {
        &self.config
    }

    /// Artifacts of the latest run, complete or not.
    pub fn artifacts(&self) -> &RunArtifacts {
        &self.artifacts
    }

    pub fn reset(&mut self) {
        self.artifacts.reset();
    }

    /// Fill `template` from the report PDFs (paths or URLs), in input order.
    pub async fn run<R: Read + Seek>(
        &mut self,
        template: &mut R,
        reports: &[String],
    ) -> Result<FillOutput, DocFillError> {
        let total_start = Instant::now();
        self.artifacts.reset();
        self.scan(template)?;
        let assistant = self.assistant()?;

        self.stage_start(Stage::Render);
        let render_start = Instant::now();
        let images = rasterise_reports(reports, &self.config).await?;
        self.artifacts.stats.reports = reports.len();
        self.artifacts.stats.render_duration_ms = render_start.elapsed().as_millis() as u64;
        self.artifacts.images = images;
        self.stage_complete(Stage::Render);

        self.finish_from_images(template, assistant, total_start).await
    }

    /// Fill `template` from page images the caller already has.
    pub async fn run_on_images<R: Read + Seek>(
        &mut self,
        template: &mut R,
        images: Vec<PageImage>,
    ) -> Result<FillOutput, DocFillError> {
        let total_start = Instant::now();
        self.artifacts.reset();
        if images.is_empty() {
            return Err(DocFillError::NoPagesConverted { reports: 0 });
        }
        self.scan(template)?;
        let assistant = self.assistant()?;
        self.artifacts.images = images;

        self.finish_from_images(template, assistant, total_start).await
    }

    /// Fill `template` with a mapping the caller supplies; no AI calls.
    ///
    /// Keys are matched to the template's placeholders the same way a model
    /// answer is, so `{{NAME}}` or ` NAME ` land on `NAME`.
    pub fn fill_with_mapping<R: Read + Seek>(
        &mut self,
        template: &mut R,
        mapping: Mapping,
    ) -> Result<FillOutput, DocFillError> {
        let total_start = Instant::now();
        self.artifacts.reset();
        self.scan(template)?;
        let placeholders = self.artifacts.placeholders.clone().unwrap_or_default();
        self.artifacts.mapping = Some(mapping.conform_to(&placeholders, &self.config.delimiters));
        self.fill(template, total_start)
    }

    async fn finish_from_images<R: Read + Seek>(
        &mut self,
        template: &mut R,
        assistant: Arc<dyn ReportAssistant>,
        total_start: Instant,
    ) -> Result<FillOutput, DocFillError> {
        // ── OCR, one page at a time ──────────────────────────────────────
        self.stage_start(Stage::Ocr);
        let ocr_start = Instant::now();
        let total_pages = self.artifacts.images.len();
        for idx in 0..total_pages {
            let page = &self.artifacts.images[idx];
            let text = ocr_page(assistant.as_ref(), page, total_pages, &self.config).await?;
            self.artifacts.stats.total_input_tokens += text.input_tokens as u64;
            self.artifacts.stats.total_output_tokens += text.output_tokens as u64;
            self.artifacts.pages.push(text);
        }
        self.artifacts.stats.pages = total_pages;
        self.artifacts.stats.ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

        let corpus = build_corpus(&self.artifacts.pages);
        info!(
            "Extracted {} chars of text from {} page(s)",
            corpus.chars().count(),
            total_pages
        );
        self.artifacts.corpus = Some(corpus.clone());
        self.stage_complete(Stage::Ocr);

        // ── Mapping ──────────────────────────────────────────────────────
        self.stage_start(Stage::Mapping);
        let mapping_start = Instant::now();
        let placeholders = self.artifacts.placeholders.clone().unwrap_or_default();
        let names: Vec<String> = placeholders.iter().cloned().collect();

        let (reply, retries) = llm::with_retries(&self.config, "Field mapping", || {
            assistant.map_fields(&names, &corpus)
        })
        .await
        .map_err(|(e, attempts)| DocFillError::MappingFailed {
            attempts,
            detail: e.message,
        })?;
        debug!("Mapping answered after {} retries", retries);
        self.artifacts.stats.total_input_tokens += reply.input_tokens as u64;
        self.artifacts.stats.total_output_tokens += reply.output_tokens as u64;

        let mapping = parse_mapping_response(&reply.content, &placeholders, &self.config.delimiters)?;
        info!(
            "Mapped {}/{} placeholder(s) to non-empty values",
            mapping.filled_count(),
            placeholders.len()
        );
        self.artifacts.stats.mapping_duration_ms = mapping_start.elapsed().as_millis() as u64;
        self.artifacts.mapping = Some(mapping);
        self.stage_complete(Stage::Mapping);

        self.fill(template, total_start)
    }

    /// Scan the template and record its placeholder set.
    fn scan<R: Read + Seek>(&mut self, template: &mut R) -> Result<(), DocFillError> {
        self.stage_start(Stage::Scan);
        let parsed = Template::from_reader(template)?;
        let placeholders = parsed.placeholders(&self.config.delimiters)?;
        if placeholders.is_empty() {
            return Err(DocFillError::NoPlaceholders {
                open: self.config.delimiters.open.clone(),
                close: self.config.delimiters.close.clone(),
            });
        }
        info!("Template has {} placeholder(s)", placeholders.len());
        self.artifacts.stats.placeholders = placeholders.len();
        self.artifacts.placeholders = Some(placeholders);
        self.stage_complete(Stage::Scan);
        Ok(())
    }

    /// Re-read the template, fill it, verify, and assemble the output.
    fn fill<R: Read + Seek>(
        &mut self,
        template: &mut R,
        total_start: Instant,
    ) -> Result<FillOutput, DocFillError> {
        self.stage_start(Stage::Fill);
        let fill_start = Instant::now();
        let delims = &self.config.delimiters;
        let mapping = self.artifacts.mapping.clone().unwrap_or_default();

        let parsed = Template::from_reader(template)?;
        let filled = parsed.fill(&mapping, delims)?;

        if self.config.verify_output {
            let remaining = Template::from_bytes(&filled.bytes)?.placeholders(delims)?;
            if !remaining.is_empty() {
                self.artifacts.report = Some(filled.report);
                return Err(DocFillError::PlaceholdersRemain {
                    names: remaining.into_iter().collect(),
                });
            }
        }

        let stats = &mut self.artifacts.stats;
        stats.mapped = mapping.filled_count();
        stats.occurrences = filled.report.occurrences();
        stats.multi_run_occurrences = filled.report.multi_run;
        stats.fill_duration_ms = fill_start.elapsed().as_millis() as u64;
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

        self.artifacts.document = Some(filled.bytes.clone());
        self.artifacts.report = Some(filled.report.clone());
        self.stage_complete(Stage::Fill);

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_complete(self.artifacts.stats.placeholders, filled.report.occurrences());
        }
        info!(
            "Run complete: {} occurrence(s) filled in {}ms",
            filled.report.occurrences(),
            self.artifacts.stats.total_duration_ms
        );

        Ok(FillOutput {
            document: filled.bytes,
            placeholders: self
                .artifacts
                .placeholders
                .iter()
                .flatten()
                .cloned()
                .collect(),
            mapping,
            corpus: self.artifacts.corpus.clone().unwrap_or_default(),
            pages: self.artifacts.pages.clone(),
            report: filled.report,
            stats: self.artifacts.stats.clone(),
        })
    }

    fn assistant(&mut self) -> Result<Arc<dyn ReportAssistant>, DocFillError> {
        if let Some(ref a) = self.assistant {
            return Ok(Arc::clone(a));
        }
        let a = llm::resolve_assistant(&self.config)?;
        self.assistant = Some(Arc::clone(&a));
        Ok(a)
    }

    fn stage_start(&self, stage: Stage) {
        info!("Stage: {}", stage);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(stage);
        }
    }

    fn stage_complete(&self, stage: Stage) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_complete(stage);
        }
    }
}

/// Resolve, render and encode every report; pages are numbered globally.
pub(crate) async fn rasterise_reports(
    reports: &[String],
    config: &FillConfig,
) -> Result<Vec<PageImage>, DocFillError> {
    let resolved = input::resolve_reports(reports, config.download_timeout_secs).await?;

    let mut images = Vec::new();
    for report in &resolved {
        let rendered = render::render_report(report.path(), config).await?;
        for page in rendered {
            let page_num = images.len() + 1;
            let encoded = encode::encode_page(&page.image, page_num, &report.label, page.source_page)
                .map_err(|e| DocFillError::RasterisationFailed {
                    path: report.path().to_path_buf(),
                    page: page.source_page,
                    detail: format!("Image encoding failed: {}", e),
                })?;
            images.push(encoded);
        }
    }

    if images.is_empty() {
        return Err(DocFillError::NoPagesConverted {
            reports: reports.len(),
        });
    }
    info!("Rendered {} page(s) from {} report(s)", images.len(), reports.len());
    Ok(images)
}

/// OCR one page, with retries, reporting progress.
pub(crate) async fn ocr_page(
    assistant: &dyn ReportAssistant,
    page: &PageImage,
    total_pages: usize,
    config: &FillConfig,
) -> Result<PageText, DocFillError> {
    let cb: Option<&dyn FillProgressCallback> = config.progress_callback.as_deref();
    if let Some(cb) = cb {
        cb.on_page_start(page.page_num, total_pages);
    }

    let start = Instant::now();
    let what = format!("Page {}", page.page_num);
    let result = llm::with_retries(config, &what, || assistant.extract_text(page)).await;

    match result {
        Ok((reply, retries)) => {
            let text = postprocess::clean_page_text(&reply.content);
            debug!(
                "Page {}: {} chars, {} input tokens, {} output tokens",
                page.page_num,
                text.len(),
                reply.input_tokens,
                reply.output_tokens
            );
            if let Some(cb) = cb {
                cb.on_page_complete(page.page_num, total_pages, text.len());
            }
            Ok(PageText {
                page_num: page.page_num,
                text,
                input_tokens: reply.input_tokens,
                output_tokens: reply.output_tokens,
                duration_ms: start.elapsed().as_millis() as u64,
                retries,
            })
        }
        Err((e, attempts)) => {
            if let Some(cb) = cb {
                cb.on_page_error(page.page_num, total_pages, &e.message);
            }
            Err(DocFillError::OcrFailed {
                page: page.page_num,
                attempts,
                detail: e.message,
            })
        }
    }
}
