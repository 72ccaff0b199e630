//! Run-span resolution: map a byte range of a container's joined text onto
//! the runs that hold it.

use thiserror::Error;

/// Whether an occurrence lives inside one run or straddles several.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    SingleRun,
    MultiRun,
}

/// The runs covered by one placeholder occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpan {
    /// Indices of covered runs, ascending. Never empty; never holds a zero-length run.
    pub covered: Vec<usize>,
    /// Local byte offset where the occurrence begins inside the first covered run.
    pub start_offset: usize,
    /// Local byte offset where the occurrence ends (exclusive) inside the last covered run.
    pub end_offset: usize,
}

impl RunSpan {
    pub fn kind(&self) -> SpanKind {
        if self.covered.len() == 1 {
            SpanKind::SingleRun
        } else {
            SpanKind::MultiRun
        }
    }

    pub fn first(&self) -> usize {
        self.covered[0]
    }

    pub fn last(&self) -> usize {
        self.covered[self.covered.len() - 1]
    }
}

/// Why a range could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpanError {
    #[error("empty span at offset {at}")]
    Empty { at: usize },

    #[error("span {start}..{end} lies outside text of length {len}")]
    OutOfRange { start: usize, end: usize, len: usize },

    #[error("offset {offset} falls inside a multi-byte character")]
    SplitsCharacter { offset: usize },
}

/// Resolve `[start, end)` of the concatenation of `runs` onto the runs.
///
/// A run is covered when its (non-empty) interval intersects the range, so
/// zero-length runs sitting on a boundary are never part of a span.
pub fn resolve_span<S: AsRef<str>>(
    runs: &[S],
    start: usize,
    end: usize,
) -> Result<RunSpan, SpanError> {
    if start >= end {
        return Err(SpanError::Empty { at: start });
    }

    let total: usize = runs.iter().map(|r| r.as_ref().len()).sum();
    if end > total {
        return Err(SpanError::OutOfRange {
            start,
            end,
            len: total,
        });
    }

    let mut covered = Vec::new();
    let mut start_offset = 0;
    let mut end_offset = 0;
    let mut run_start = 0;

    for (idx, run) in runs.iter().enumerate() {
        let text = run.as_ref();
        let run_end = run_start + text.len();

        if run_start < run_end && run_start < end && start < run_end {
            if covered.is_empty() {
                start_offset = start - run_start;
                if !text.is_char_boundary(start_offset) {
                    return Err(SpanError::SplitsCharacter { offset: start });
                }
            }
            end_offset = end.min(run_end) - run_start;
            if !text.is_char_boundary(end_offset) {
                return Err(SpanError::SplitsCharacter { offset: end });
            }
            covered.push(idx);
        }

        if run_end >= end {
            break;
        }
        run_start = run_end;
    }

    if covered.is_empty() {
        return Err(SpanError::OutOfRange {
            start,
            end,
            len: total,
        });
    }

    Ok(RunSpan {
        covered,
        start_offset,
        end_offset,
    })
}
