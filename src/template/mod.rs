//! DOCX templates: scanning for placeholders and filling them.
//!
//! ## Layers
//!
//! ```text
//! Template ──▶ XmlPart ──▶ XmlParagraph ──▶ XmlRun
//!  (zip)       (events)     (container)      (w:t text)
//! ```
//!
//! 1. [`scan`]       — find `{{NAME}}` tokens in a container's joined text
//! 2. [`span`]       — map a token's byte range onto the runs holding it
//! 3. [`substitute`] — rewrite those runs, last occurrence first
//! 4. [`xml`]        — read and write WordprocessingML parts
//!
//! Only the body, header, footer, footnote and endnote parts are parsed.
//! Every other zip entry is copied through untouched, and so is any XML part
//! in which nothing was replaced.

pub mod scan;
pub mod span;
pub mod substitute;
pub mod xml;

pub use scan::{find_placeholders, Delimiters, PlaceholderMatch};
pub use span::{resolve_span, RunSpan, SpanError, SpanKind};
pub use substitute::{fill_container, EditableRun, FillReport};

use crate::error::DocFillError;
use crate::mapping::Mapping;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tracing::{debug, info};
use xml::XmlPart;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";
const MAX_PREALLOC: u64 = 64 << 20;

static RE_TEXT_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^word/(document|header\d*|footer\d*|footnotes|endnotes)\.xml$")
        .expect("static regex")
});

/// One entry of the zip package.
#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

impl Entry {
    fn is_text_part(&self) -> bool {
        !self.is_dir && RE_TEXT_PART.is_match(&self.name)
    }
}

/// A DOCX template loaded into memory.
#[derive(Debug, Clone)]
pub struct Template {
    entries: Vec<Entry>,
}

/// The bytes of a filled document and what the fill did.
#[derive(Debug, Clone)]
pub struct FilledDocument {
    pub bytes: Vec<u8>,
    pub report: FillReport,
}

impl Template {
    /// Read a template from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocFillError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => DocFillError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => DocFillError::TemplateNotFound {
                path: path.to_path_buf(),
            },
        })?;
        Self::from_bytes(&bytes)
    }

    /// Read a template from a seekable source, rewinding it first so the same
    /// reader can be handed in again on the next run.
    pub fn from_reader<R: Read + Seek>(reader: &mut R) -> Result<Self, DocFillError> {
        reader
            .rewind()
            .map_err(|e| DocFillError::invalid_template(format!("cannot rewind: {e}")))?;
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| DocFillError::invalid_template(format!("cannot read: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocFillError> {
        if bytes.len() < 4 || &bytes[..4] != ZIP_MAGIC {
            let mut magic = [0u8; 4];
            let n = bytes.len().min(4);
            magic[..n].copy_from_slice(&bytes[..n]);
            return Err(DocFillError::NotADocx { magic });
        }

        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(DocFillError::invalid_template)?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(DocFillError::invalid_template)?;
            let mut data = Vec::with_capacity(capacity_hint(file.size()));
            file.read_to_end(&mut data)
                .map_err(|e| DocFillError::invalid_template(format!("{}: {e}", file.name())))?;
            entries.push(Entry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                is_dir: file.is_dir(),
            });
        }

        if !entries.iter().any(|e| e.name == "word/document.xml") {
            return Err(DocFillError::invalid_template(
                "package has no word/document.xml",
            ));
        }

        debug!("Loaded template with {} zip entries", entries.len());
        Ok(Self { entries })
    }

    /// Names of the XML parts that are scanned and filled, in package order.
    pub fn text_parts(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.is_text_part())
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Distinct placeholder names across every text part, sorted.
    pub fn placeholders(&self, delims: &Delimiters) -> Result<BTreeSet<String>, DocFillError> {
        let mut names = BTreeSet::new();
        for entry in self.entries.iter().filter(|e| e.is_text_part()) {
            let part = XmlPart::parse(&entry.name, &entry.data)?;
            for paragraph in &part.paragraphs {
                let text = paragraph.text();
                names.extend(find_placeholders(&text, delims).into_iter().map(|m| m.name));
            }
        }
        Ok(names)
    }

    /// Replace every placeholder occurrence using `mapping`.
    ///
    /// Fails without producing a document when any occurrence cannot be
    /// resolved onto runs.
    pub fn fill(
        &self,
        mapping: &Mapping,
        delims: &Delimiters,
    ) -> Result<FilledDocument, DocFillError> {
        let mut report = FillReport::default();
        let mut out = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            let options = SimpleFileOptions::default().compression_method(match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            });

            if entry.is_dir {
                out.add_directory(entry.name.as_str(), options)
                    .map_err(|e| DocFillError::Internal(format!("zip write: {e}")))?;
                continue;
            }

            let data = if entry.is_text_part() {
                fill_part(&entry.name, &entry.data, mapping, delims, &mut report)?
            } else {
                None
            };

            out.start_file(entry.name.as_str(), options)
                .map_err(|e| DocFillError::Internal(format!("zip write: {e}")))?;
            out.write_all(data.as_deref().unwrap_or(&entry.data))
                .map_err(|e| DocFillError::Internal(format!("zip write: {e}")))?;
        }

        let bytes = out
            .finish()
            .map_err(|e| DocFillError::Internal(format!("zip finish: {e}")))?
            .into_inner();

        info!(
            "Filled {} occurrence(s) ({} single-run, {} multi-run)",
            report.occurrences(),
            report.single_run,
            report.multi_run
        );
        Ok(FilledDocument { bytes, report })
    }
}

/// Preallocation for an entry of the declared size; the header is not
/// trusted beyond 64 MiB.
fn capacity_hint(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}

/// Fill one XML part. Returns `None` when nothing in it changed.
fn fill_part(
    name: &str,
    data: &[u8],
    mapping: &Mapping,
    delims: &Delimiters,
    report: &mut FillReport,
) -> Result<Option<Vec<u8>>, DocFillError> {
    let mut part = XmlPart::parse(name, data)?;

    for paragraph in &mut part.paragraphs {
        let container = paragraph.container;
        let ordinal = paragraph.ordinal;
        fill_container(&mut paragraph.runs, delims, mapping, report).map_err(|e| {
            DocFillError::UnresolvedSpan {
                part: name.to_string(),
                container,
                paragraph: ordinal,
                placeholder: e.placeholder,
                detail: e.error.to_string(),
            }
        })?;
    }

    if !part.is_dirty() {
        return Ok(None);
    }
    debug!("Rewriting part {name}");
    part.to_bytes().map(Some)
}
