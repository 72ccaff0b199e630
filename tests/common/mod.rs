//! Shared fixtures: in-memory DOCX packages and a scripted assistant.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_docfill::pipeline::encode::encode_page;
use edgequake_docfill::{AssistantError, AssistantReply, PageImage, ReportAssistant};
use image::DynamicImage;
use std::io::{Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Route library logs to the test harness; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Wrap body XML in a `w:document` part.
pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}"><w:body>{body}</w:body></w:document>"#
    )
}

/// Wrap paragraphs in a header or footer part.
pub fn header_xml(root: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:{root} xmlns:w="{W_NS}">{body}</w:{root}>"#
    )
}

/// A paragraph with one plain run.
pub fn para(text: &str) -> String {
    format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
}

/// Build a DOCX package with the given extra parts next to the document.
pub fn docx_with_parts(body: &str, extra: &[(&str, String)]) -> Vec<u8> {
    let mut w = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();

    w.start_file("[Content_Types].xml", opts).unwrap();
    w.write_all(br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
        .unwrap();
    w.start_file("word/document.xml", opts).unwrap();
    w.write_all(document_xml(body).as_bytes()).unwrap();
    for (name, xml) in extra {
        w.start_file(*name, opts).unwrap();
        w.write_all(xml.as_bytes()).unwrap();
    }
    w.start_file("word/media/logo.bin", opts).unwrap();
    w.write_all(&[0u8, 1, 2, 3, 0xFF]).unwrap();

    w.finish().unwrap().into_inner()
}

pub fn docx(body: &str) -> Vec<u8> {
    docx_with_parts(body, &[])
}

/// Read one entry of a package as a string.
pub fn part(docx: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(docx)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut s = String::new();
    file.read_to_string(&mut s).unwrap();
    s
}

pub fn raw_part(docx: &[u8], name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(docx)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut v = Vec::new();
    file.read_to_end(&mut v).unwrap();
    v
}

/// Small blank page images, numbered from 1.
pub fn page_images(n: usize) -> Vec<PageImage> {
    (1..=n)
        .map(|i| encode_page(&DynamicImage::new_rgb8(8, 8), i, "report.pdf", i).unwrap())
        .collect()
}

/// Answers OCR with a fixed text per page and mapping with a fixed reply.
pub struct ScriptedAssistant {
    pub page_texts: Vec<String>,
    pub mapping_reply: String,
    /// OCR of this page number fails every time.
    pub failing_page: Option<usize>,
    /// Mapping fails this many times before answering.
    pub mapping_failures: AtomicUsize,
    pub ocr_calls: AtomicUsize,
    pub mapping_calls: AtomicUsize,
    pub seen_placeholders: Mutex<Vec<String>>,
    pub seen_corpus: Mutex<String>,
}

impl ScriptedAssistant {
    pub fn new(page_texts: &[&str], mapping_reply: &str) -> Self {
        Self {
            page_texts: page_texts.iter().map(|s| s.to_string()).collect(),
            mapping_reply: mapping_reply.to_string(),
            failing_page: None,
            mapping_failures: AtomicUsize::new(0),
            ocr_calls: AtomicUsize::new(0),
            mapping_calls: AtomicUsize::new(0),
            seen_placeholders: Mutex::new(Vec::new()),
            seen_corpus: Mutex::new(String::new()),
        }
    }
}

#[async_trait]
impl ReportAssistant for ScriptedAssistant {
    async fn extract_text(&self, page: &PageImage) -> Result<AssistantReply, AssistantError> {
        self.ocr_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_page == Some(page.page_num) {
            return Err(AssistantError::new("vision model unavailable"));
        }
        let text = self
            .page_texts
            .get(page.page_num - 1)
            .cloned()
            .unwrap_or_default();
        Ok(AssistantReply {
            content: text,
            input_tokens: 100,
            output_tokens: 10,
        })
    }

    async fn map_fields(
        &self,
        placeholders: &[String],
        corpus: &str,
    ) -> Result<AssistantReply, AssistantError> {
        self.mapping_calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_placeholders.lock().unwrap() = placeholders.to_vec();
        *self.seen_corpus.lock().unwrap() = corpus.to_string();

        let remaining = self.mapping_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.mapping_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AssistantError::new("rate limited"));
        }
        Ok(AssistantReply {
            content: self.mapping_reply.clone(),
            input_tokens: 500,
            output_tokens: 50,
        })
    }

    fn name(&self) -> String {
        "scripted".to_string()
    }
}
