//! Substitution engine: rewrite the runs of one container.
//!
//! All occurrences of a container are located once, then applied from the
//! last to the first. Editing the tail first keeps the byte offsets of every
//! earlier occurrence valid without re-scanning.

use super::scan::{find_placeholders, Delimiters};
use super::span::{resolve_span, RunSpan, SpanError, SpanKind};
use crate::mapping::Mapping;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use tracing::debug;

/// A run whose text can be edited in place.
///
/// Implemented for `String` and for the XML-backed runs of a DOCX part, so
/// the engine never needs to know where the text lives.
pub trait EditableRun: AsRef<str> {
    /// Replace the bytes in `range` (relative to this run's text) with `with`.
    ///
    /// Fails, leaving the run unchanged, when `range` does not lie on
    /// character boundaries inside the text.
    fn splice_text(&mut self, range: Range<usize>, with: &str) -> Result<(), SpanError>;
}

impl EditableRun for String {
    fn splice_text(&mut self, range: Range<usize>, with: &str) -> Result<(), SpanError> {
        check_splice(self, &range)?;
        self.replace_range(range, with);
        Ok(())
    }
}

/// Validate a splice range against `text`.
pub(crate) fn check_splice(text: &str, range: &Range<usize>) -> Result<(), SpanError> {
    if range.start > range.end || range.end > text.len() {
        return Err(SpanError::OutOfRange {
            start: range.start,
            end: range.end,
            len: text.len(),
        });
    }
    for offset in [range.start, range.end] {
        if !text.is_char_boundary(offset) {
            return Err(SpanError::SplitsCharacter { offset });
        }
    }
    Ok(())
}

/// Apply one resolved occurrence to `runs`.
///
/// Single-run: prefix + replacement + suffix in that run. Multi-run: the
/// first covered run keeps its prefix and takes the whole replacement, the
/// interior runs are emptied in place, the last keeps only its suffix.
pub fn apply_occurrence<R: EditableRun>(
    runs: &mut [R],
    span: &RunSpan,
    replacement: &str,
) -> Result<(), SpanError> {
    match span.kind() {
        SpanKind::SingleRun => {
            runs[span.first()].splice_text(span.start_offset..span.end_offset, replacement)
        }
        SpanKind::MultiRun => {
            let (first, last) = (span.first(), span.last());

            runs[last].splice_text(0..span.end_offset, "")?;

            for &idx in &span.covered[1..span.covered.len() - 1] {
                let len = runs[idx].as_ref().len();
                runs[idx].splice_text(0..len, "")?;
            }

            let len = runs[first].as_ref().len();
            runs[first].splice_text(span.start_offset..len, replacement)
        }
    }
}

/// What a fill pass did, summed over every container it touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    /// Occurrences replaced, per placeholder name.
    pub replaced: BTreeMap<String, usize>,
    /// Placeholders with no mapping entry; they were replaced by an empty string.
    pub missing: BTreeSet<String>,
    pub single_run: usize,
    pub multi_run: usize,
}

impl FillReport {
    pub fn occurrences(&self) -> usize {
        self.single_run + self.multi_run
    }

    pub fn merge(&mut self, other: FillReport) {
        for (name, n) in other.replaced {
            *self.replaced.entry(name).or_default() += n;
        }
        self.missing.extend(other.missing);
        self.single_run += other.single_run;
        self.multi_run += other.multi_run;
    }
}

/// An occurrence the resolver could not place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceError {
    pub placeholder: String,
    pub error: SpanError,
}

/// Fill every placeholder occurrence in one container.
///
/// Runs are only touched once every occurrence has resolved, so a failing
/// container is left as it was.
pub fn fill_container<R: EditableRun>(
    runs: &mut [R],
    delims: &Delimiters,
    mapping: &Mapping,
    report: &mut FillReport,
) -> Result<usize, OccurrenceError> {
    let joined: String = runs.iter().map(|r| r.as_ref()).collect();
    let found = find_placeholders(&joined, delims);
    if found.is_empty() {
        return Ok(0);
    }

    let mut resolved = Vec::with_capacity(found.len());
    for m in found {
        let span = resolve_span(runs, m.start, m.end).map_err(|error| OccurrenceError {
            placeholder: m.name.clone(),
            error,
        })?;
        resolved.push((m, span));
    }

    let count = resolved.len();
    for (m, span) in resolved.into_iter().rev() {
        let value = match mapping.get(&m.name) {
            Some(v) => v,
            None => {
                report.missing.insert(m.name.clone());
                ""
            }
        };

        match span.kind() {
            SpanKind::SingleRun => report.single_run += 1,
            SpanKind::MultiRun => report.multi_run += 1,
        }
        debug!(
            placeholder = %m.name,
            runs = span.covered.len(),
            "Substituting occurrence at {}..{}",
            m.start,
            m.end
        );

        apply_occurrence(runs, &span, value).map_err(|error| OccurrenceError {
            placeholder: m.name.clone(),
            error,
        })?;
        *report.replaced.entry(m.name).or_default() += 1;
    }

    Ok(count)
}
