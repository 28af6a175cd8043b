//! Recursive character splitter with overlap
//!
//! Text is first broken into atomic pieces no longer than
//! `chunk_size - chunk_overlap`, trying separators in order (paragraph, line,
//! sentence, word) and falling back to fixed character windows. Pieces are then
//! merged greedily into chunks of at most `chunk_size` characters; every chunk
//! after the first starts `chunk_overlap` characters before the trimmed end of
//! its predecessor.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::error::{Error, Result};

/// Default separator hierarchy; the empty string means character level
pub fn default_separators() -> Vec<String> {
    ["\n\n", "\n", ". ", " ", ""]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Content class used to choose a chunking policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Paginated or structured documents (PDF, scanned reports)
    #[serde(alias = "pdf")]
    Paginated,
    /// Narrative documents (DOCX)
    #[serde(alias = "docx")]
    Narrative,
    /// Plain text files
    #[serde(alias = "txt", alias = "text")]
    PlainText,
    /// Anything else (tabular rows, datasets)
    #[default]
    Default,
}

/// Splitter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters of trailing context repeated at the start of the next chunk
    pub chunk_overlap: usize,
    /// Separators tried in order
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

impl ChunkingConfig {
    /// Create a config with the default separators
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: default_separators(),
        }
    }

    /// Reject configurations the splitter cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::split("chunk_size must be greater than zero"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::split(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::new(1200, 200)
    }
}

/// A chunk and its character range in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Chunk text, trimmed
    pub text: String,
    /// Character offset of the first character of `text`
    pub start: usize,
    /// Character offset one past the last character of `text`
    pub end: usize,
}

/// Split text into overlapping chunks
pub fn split(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    Ok(split_spans(text, config)?
        .into_iter()
        .map(|span| span.text)
        .collect())
}

/// Split text into overlapping chunks, keeping their source ranges
pub fn split_spans(text: &str, config: &ChunkingConfig) -> Result<Vec<ChunkSpan>> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    if chars.iter().all(|c| c.is_whitespace()) {
        return Ok(Vec::new());
    }

    let separators: Vec<Vec<char>> = config
        .separators
        .iter()
        .map(|s| s.chars().collect())
        .collect();
    let piece_limit = config.chunk_size - config.chunk_overlap;

    let mut pieces = Vec::new();
    atomize(&chars, 0..chars.len(), &separators, piece_limit, &mut pieces);
    let boundaries: Vec<usize> = pieces.iter().map(|p| p.end).collect();

    Ok(merge(&chars, &boundaries, config.chunk_size, config.chunk_overlap))
}

/// Break `range` into contiguous pieces of at most `limit` characters
fn atomize(
    chars: &[char],
    range: Range<usize>,
    separators: &[Vec<char>],
    limit: usize,
    out: &mut Vec<Range<usize>>,
) {
    if range.len() <= limit {
        if !range.is_empty() {
            out.push(range);
        }
        return;
    }

    let found = separators
        .iter()
        .enumerate()
        .filter(|(_, sep)| !sep.is_empty())
        .find_map(|(level, sep)| {
            let hits = occurrences(&chars[range.clone()], sep);
            (!hits.is_empty()).then_some((level, hits))
        });

    let Some((level, hits)) = found else {
        let mut start = range.start;
        while start < range.end {
            let end = (start + limit).min(range.end);
            out.push(start..end);
            start = end;
        }
        return;
    };

    // Each separator is kept at the start of the piece that follows it
    let mut cuts = vec![range.start];
    cuts.extend(hits.into_iter().map(|offset| range.start + offset));
    cuts.push(range.end);
    cuts.dedup();

    for window in cuts.windows(2) {
        atomize(chars, window[0]..window[1], &separators[level + 1..], limit, out);
    }
}

/// Non-overlapping occurrences of `needle`, excluding one at offset zero
fn occurrences(haystack: &[char], needle: &[char]) -> Vec<usize> {
    let mut hits = Vec::new();
    let mut i = 1;
    while i + needle.len() <= haystack.len() {
        if haystack[i..i + needle.len()] == *needle {
            hits.push(i);
            i += needle.len();
        } else {
            i += 1;
        }
    }
    hits
}

/// Merge atomic pieces into chunks
///
/// Each chunk starts at the tail of its predecessor, `overlap` characters
/// before the predecessor's trimmed end, and must reach at least one visible
/// character past that end. Only when a whitespace gap is too wide to bridge
/// from the tail does the start move forward instead.
fn merge(chars: &[char], boundaries: &[usize], size: usize, overlap: usize) -> Vec<ChunkSpan> {
    let total = chars.len();
    let mut spans: Vec<ChunkSpan> = Vec::new();
    let mut start = 0;

    loop {
        let covered = spans.last().map_or(0, |span| span.end);
        let Some(next_visible) = (covered..total).find(|&i| !chars[i].is_whitespace()) else {
            break;
        };
        if next_visible >= start + size {
            start = next_visible + 1 - size;
        }

        let limit = (start + size).min(total);
        let fit = boundaries.partition_point(|&b| b <= limit);
        let end = match fit.checked_sub(1).map(|i| boundaries[i]) {
            Some(b) if b > next_visible => b,
            _ => limit,
        };

        let (t_start, t_end) = trimmed_bounds(chars, start, end);
        spans.push(ChunkSpan {
            text: chars[t_start..t_end].iter().collect(),
            start: t_start,
            end: t_end,
        });

        if end >= total {
            break;
        }
        start = t_start.max(t_end.saturating_sub(overlap));
    }

    spans
}

fn trimmed_bounds(chars: &[char], start: usize, end: usize) -> (usize, usize) {
    let mut s = start;
    let mut e = end;
    while s < e && chars[s].is_whitespace() {
        s += 1;
    }
    while e > s && chars[e - 1].is_whitespace() {
        e -= 1;
    }
    (s, e)
}
