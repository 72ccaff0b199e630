//! WordprocessingML parts as editable event lists.
//!
//! A part is read into owned `quick_xml` events once. Paragraphs (`w:p`)
//! become containers of runs (`w:r`); a run's text is the concatenation of
//! the text inside its `w:t` elements. Edits only ever replace the text
//! events of `w:t` elements (and add `xml:space="preserve"` where needed),
//! so every other byte of the part, including each `w:rPr`, is written back
//! exactly as it was read.

use super::span::{resolve_span, SpanError};
use super::substitute::{apply_occurrence, check_splice, EditableRun};
use crate::error::DocFillError;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::ops::Range;

const PARAGRAPH: &[u8] = b"w:p";
const RUN: &[u8] = b"w:r";
const TEXT: &[u8] = b"w:t";
const TABLE_CELL: &[u8] = b"w:tc";

/// One `w:t` text event inside a run.
#[derive(Debug, Clone)]
struct Segment {
    /// Index of the `w:t` start event.
    tag: usize,
    /// Index of the text event.
    event: usize,
    /// Byte length of this segment's text inside the run text.
    len: usize,
}

/// A `w:r` element reduced to its text and the events that carry it.
#[derive(Debug, Clone, Default)]
pub struct XmlRun {
    text: String,
    segments: Vec<Segment>,
    dirty: bool,
}

impl XmlRun {
    fn segment_texts(&self) -> Vec<&str> {
        let mut at = 0;
        self.segments
            .iter()
            .map(|s| {
                let t = &self.text[at..at + s.len];
                at += s.len;
                t
            })
            .collect()
    }
}

impl AsRef<str> for XmlRun {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl EditableRun for XmlRun {
    /// Splice within a run that may hold several `w:t` elements.
    ///
    /// The segments are rewritten with the same first/interior/last rule the
    /// engine uses for runs, so text stays inside the `w:t` it came from.
    fn splice_text(&mut self, range: Range<usize>, with: &str) -> Result<(), SpanError> {
        check_splice(&self.text, &range)?;
        if range.is_empty() && with.is_empty() {
            return Ok(());
        }

        let mut texts: Vec<String> = self.segment_texts().into_iter().map(String::from).collect();
        if texts.is_empty() {
            return Ok(());
        }
        if texts.len() == 1 || range.is_empty() {
            // Single segment, or a pure insertion: edit the joined text and
            // give everything to the segment holding the start offset.
            let idx = segment_at(&texts, range.start);
            let before: usize = texts[..idx].iter().map(String::len).sum();
            let local = range.start - before..range.end - before;
            texts[idx].replace_range(local, with);
        } else {
            let span = resolve_span(&texts, range.start, range.end)?;
            apply_occurrence(&mut texts, &span, with)?;
        }

        self.text = texts.concat();
        for (seg, t) in self.segments.iter_mut().zip(&texts) {
            seg.len = t.len();
        }
        self.dirty = true;
        Ok(())
    }
}

fn segment_at(texts: &[String], offset: usize) -> usize {
    let mut at = 0;
    for (idx, t) in texts.iter().enumerate() {
        if offset < at + t.len() {
            return idx;
        }
        at += t.len();
    }
    texts.len().saturating_sub(1)
}

/// A paragraph and the runs it directly owns.
#[derive(Debug, Clone)]
pub struct XmlParagraph {
    /// Human label of the container kind, used in error messages.
    pub container: &'static str,
    /// 1-based position among the paragraphs of the part.
    pub ordinal: usize,
    pub runs: Vec<XmlRun>,
}

impl XmlParagraph {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// A parsed XML part of the package.
#[derive(Debug, Clone)]
pub struct XmlPart {
    events: Vec<Event<'static>>,
    pub paragraphs: Vec<XmlParagraph>,
}

impl XmlPart {
    /// Parse `bytes` and index every paragraph, including those in table
    /// cells at any depth and in text boxes.
    pub fn parse(name: &str, bytes: &[u8]) -> Result<Self, DocFillError> {
        let mut reader = Reader::from_reader(bytes);
        let mut events = Vec::new();
        let mut paragraphs: Vec<XmlParagraph> = Vec::new();

        let mut open_paragraphs: Vec<usize> = Vec::new();
        let mut open_runs: Vec<(usize, usize)> = Vec::new();
        let mut open_text: Option<usize> = None;
        let mut cell_depth = 0usize;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| {
                    DocFillError::invalid_template(format!(
                        "{name}: XML error at byte {}: {e}",
                        reader.buffer_position()
                    ))
                })?
                .into_owned();
            let idx = events.len();

            match &event {
                Event::Eof => break,
                Event::Start(e) => match e.name().as_ref() {
                    PARAGRAPH => {
                        paragraphs.push(XmlParagraph {
                            container: if cell_depth > 0 { "table cell" } else { "paragraph" },
                            ordinal: paragraphs.len() + 1,
                            runs: Vec::new(),
                        });
                        open_paragraphs.push(paragraphs.len() - 1);
                    }
                    RUN => {
                        if let Some(&p) = open_paragraphs.last() {
                            paragraphs[p].runs.push(XmlRun::default());
                            open_runs.push((p, paragraphs[p].runs.len() - 1));
                        }
                    }
                    TEXT if !open_runs.is_empty() => open_text = Some(idx),
                    TABLE_CELL => cell_depth += 1,
                    _ => {}
                },
                Event::End(e) => match e.name().as_ref() {
                    PARAGRAPH => {
                        open_paragraphs.pop();
                    }
                    RUN => {
                        open_runs.pop();
                    }
                    TEXT => open_text = None,
                    TABLE_CELL => cell_depth = cell_depth.saturating_sub(1),
                    _ => {}
                },
                Event::Text(t) => {
                    if let (Some(tag), Some(&(p, r))) = (open_text, open_runs.last()) {
                        let text = t.unescape().map_err(|e| {
                            DocFillError::invalid_template(format!("{name}: bad text: {e}"))
                        })?;
                        let run = &mut paragraphs[p].runs[r];
                        run.text.push_str(&text);
                        run.segments.push(Segment {
                            tag,
                            event: idx,
                            len: text.len(),
                        });
                    }
                }
                _ => {}
            }

            events.push(event);
        }

        Ok(Self { events, paragraphs })
    }

    pub fn is_dirty(&self) -> bool {
        self.paragraphs
            .iter()
            .any(|p| p.runs.iter().any(|r| r.dirty))
    }

    /// Serialise the part, writing back the text of every edited run.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocFillError> {
        let mut events = self.events.clone();

        for run in self.paragraphs.iter().flat_map(|p| &p.runs).filter(|r| r.dirty) {
            for (seg, text) in run.segments.iter().zip(run.segment_texts()) {
                events[seg.event] = Event::Text(BytesText::new(text).into_owned());
                if needs_preserve(text) {
                    if let Event::Start(start) = &events[seg.tag] {
                        let tag = with_preserve(start)?;
                        events[seg.tag] = Event::Start(tag);
                    }
                }
            }
        }

        let mut writer = Writer::new(Vec::with_capacity(self.events.len() * 16));
        for event in &events {
            writer
                .write_event(event)
                .map_err(|e| DocFillError::Internal(format!("XML write failed: {e}")))?;
        }
        Ok(writer.into_inner())
    }
}

fn needs_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

fn with_preserve(start: &BytesStart<'static>) -> Result<BytesStart<'static>, DocFillError> {
    let present = start
        .try_get_attribute("xml:space")
        .map_err(|e| DocFillError::invalid_template(format!("bad w:t attribute: {e}")))?
        .is_some();
    let mut tag = start.clone();
    if !present {
        tag.push_attribute(("xml:space", "preserve"));
    }
    Ok(tag)
}
