//! Text chunking with a separator cascade
//!
//! This module handles splitting documents into chunks while:
//! - Preferring paragraph, then line, then sentence, then word boundaries
//! - Guaranteeing the hard `max_size` bound (falling back to characters)
//! - Overlapping adjacent chunks on word boundaries
//! - Covering the input exactly, so the text can be rebuilt from its chunks

mod boundaries;

pub use boundaries::*;

use crate::config::ChunkConfig;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::normalize::{normalizer_for, Normalizer};
use serde::{Deserialize, Serialize};
use std::iter;

/// A text chunk with its position in the source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Document the chunk was cut from
    pub source_id: String,

    /// Chunk index within the document (0-based)
    pub index: usize,

    /// The actual text content
    pub text: String,

    /// Character start position in the (normalized) document
    pub start_offset: usize,

    /// Character end position (exclusive)
    pub end_offset: usize,
}

impl Chunk {
    /// Length in characters
    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }

    /// Stable store key: `{source_id}_{index}`
    pub fn record_id(&self) -> String {
        format!("{}_{}", self.source_id, self.index)
    }
}

/// Reject sizes the splitter cannot honour
pub fn validate_params(max_size: usize, overlap: usize) -> Result<()> {
    if max_size == 0 {
        return Err(Error::InvalidConfig(
            "chunk max_size must be positive".to_string(),
        ));
    }
    if overlap >= max_size {
        return Err(Error::InvalidConfig(format!(
            "chunk overlap ({}) must be smaller than max_size ({})",
            overlap, max_size
        )));
    }
    Ok(())
}

/// Split `text` into chunks of at most `max_size` characters, adjacent
/// chunks sharing at most `overlap` characters.
///
/// Returned chunks carry an empty `source_id`; use [`Chunker`] to chunk a
/// [`Document`].
pub fn split(text: &str, max_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    validate_params(max_size, overlap)?;

    if text.is_empty() {
        return Ok(Vec::new());
    }

    let index = TextIndex::new(text);

    let mut pieces = Vec::new();
    partition(
        &index,
        0,
        index.len(),
        SeparatorLevel::Paragraph,
        max_size,
        &mut pieces,
    );

    let spans = merge_pieces(&index, &pieces, max_size, overlap);

    Ok(spans
        .into_iter()
        .enumerate()
        .map(|(i, (start, end))| Chunk {
            source_id: String::new(),
            index: i,
            text: index.slice(start, end).to_string(),
            start_offset: start,
            end_offset: end,
        })
        .collect())
}

/// Rebuild the original text from ordered chunks by dropping the overlaps
pub fn reconstruct(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;

    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.start_offset);
        out.extend(chunk.text.chars().skip(skip));
        covered = covered.max(chunk.end_offset);
    }

    out
}

/// Cut `[start, end)` into contiguous pieces of at most `max` chars, using
/// the coarsest separator that works for each region.
fn partition(
    index: &TextIndex<'_>,
    start: usize,
    end: usize,
    level: SeparatorLevel,
    max: usize,
    out: &mut Vec<(usize, usize)>,
) {
    if end - start <= max {
        out.push((start, end));
        return;
    }

    let cuts = index.breaks_within(level, start, end);
    let finer = level.finer().unwrap_or(level);

    if cuts.is_empty() {
        partition(index, start, end, finer, max, out);
        return;
    }

    let mut seg_start = start;
    for cut in cuts.into_iter().chain(iter::once(end)) {
        if cut - seg_start <= max {
            out.push((seg_start, cut));
        } else {
            partition(index, seg_start, cut, finer, max, out);
        }
        seg_start = cut;
    }
}

/// Greedily pack pieces into chunks, starting each new chunk inside the
/// tail of the previous one when a word boundary allows it.
fn merge_pieces(
    index: &TextIndex<'_>,
    pieces: &[(usize, usize)],
    max: usize,
    overlap: usize,
) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let Some(&(first_start, _)) = pieces.first() else {
        return spans;
    };

    let mut chunk_start = first_start;
    let mut chunk_end = first_start;

    for &(_, piece_end) in pieces {
        if piece_end - chunk_start <= max {
            chunk_end = piece_end;
            continue;
        }

        spans.push((chunk_start, chunk_end));
        chunk_start = overlap_start(index, chunk_start, chunk_end, piece_end, max, overlap);
        chunk_end = piece_end;
    }

    spans.push((chunk_start, chunk_end));
    spans
}

/// Earliest word start in the last `overlap` chars of `[start, end)` from
/// which the next piece still fits; `end` (no overlap) otherwise.
fn overlap_start(
    index: &TextIndex<'_>,
    start: usize,
    end: usize,
    next_end: usize,
    max: usize,
    overlap: usize,
) -> usize {
    if overlap == 0 {
        return end;
    }

    let window_start = end.saturating_sub(overlap).max(start + 1);
    index
        .word_starts_between(window_start, end)
        .iter()
        .copied()
        .find(|&p| next_end - p <= max)
        .unwrap_or(end)
}

/// Document chunker bound to a chunk configuration and normalization policy
pub struct Chunker {
    max_chars: usize,
    overlap_chars: usize,
    normalizer: Box<dyn Normalizer>,
}

impl Chunker {
    /// Create a chunker without normalization
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self> {
        validate_params(max_chars, overlap_chars)?;
        Ok(Self {
            max_chars,
            overlap_chars,
            normalizer: normalizer_for("none")?,
        })
    }

    /// Create a chunker from configuration
    pub fn from_config(config: &ChunkConfig) -> Result<Self> {
        let chunker = Self::new(config.max_chars, config.overlap_chars)?;
        Ok(chunker.with_normalizer(normalizer_for(&config.normalizer)?))
    }

    /// Replace the normalization policy
    pub fn with_normalizer(mut self, normalizer: Box<dyn Normalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Normalize and split a document
    pub fn chunk_document(&self, doc: &Document) -> Result<Vec<Chunk>> {
        let text = self.normalizer.normalize(&doc.text);
        let mut chunks = split(&text, self.max_chars, self.overlap_chars)?;
        for chunk in &mut chunks {
            chunk.source_id = doc.source_id.clone();
        }
        Ok(chunks)
    }
}
