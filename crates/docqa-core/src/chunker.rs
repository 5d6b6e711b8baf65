//! Fixed-window chunking with character overlap.
//!
//! Sizes are counted in Unicode scalar values. Every chunk after the first
//! starts with exactly `overlap` characters copied from the end of the
//! previous one, so [`reassemble`] can rebuild the source text.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

const SENTENCE_ENDS: [char; 3] = ['.', '!', '?'];

/// One window of text produced by the chunker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub content: String,
    /// Leading characters shared with the previous segment.
    pub overlap: usize,
    /// Character offset of the segment in the source text.
    pub start: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_size: usize,
    pub overlap: usize,
    pub respect_sentences: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_size: 1000, overlap: 200, respect_sentences: true }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::InvalidConfig("chunking.max_size must be greater than 0".into()));
        }
        if self.overlap >= self.max_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap ({}) must be smaller than chunking.max_size ({})",
                self.overlap, self.max_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn split(&self, text: &str) -> Vec<Segment> {
        split_validated(text, self.config.max_size, self.config.overlap, self.config.respect_sentences)
    }

    /// Chunks a document and labels every piece with its identity and position.
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        let segments = self.split(&doc.text);
        let total = segments.len();
        let source = doc.source_name();
        segments
            .into_iter()
            .enumerate()
            .map(|(index, seg)| Chunk {
                id: format!("{}:{}", doc.id, index),
                doc_id: doc.id.clone(),
                source: source.clone(),
                format: doc.format,
                index,
                total,
                overlap: seg.overlap,
                content: seg.content,
            })
            .collect()
    }
}

/// Splits `text` into hard-cut windows of at most `max_size` characters.
pub fn chunk(text: &str, max_size: usize, overlap: usize) -> Result<Vec<Segment>> {
    ChunkingConfig { max_size, overlap, respect_sentences: false }.validate()?;
    Ok(split_validated(text, max_size, overlap, false))
}

/// Concatenates `(content, overlap)` pairs, dropping the repeated prefix of each.
pub fn reassemble<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = (&'a str, usize)>,
{
    let mut out = String::new();
    for (content, overlap) in parts {
        out.extend(content.chars().skip(overlap));
    }
    out
}

fn split_validated(text: &str, max_size: usize, overlap: usize, respect_sentences: bool) -> Vec<Segment> {
    if text.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let n = chars.len();

    let mut segments = Vec::new();
    let mut start = 0usize;
    loop {
        let mut end = start.saturating_add(max_size).min(n);
        if end < n && respect_sentences {
            // the cut must keep more than `overlap` characters or the next window would not advance
            if let Some(idx) = (start + overlap..end).rev().find(|&i| SENTENCE_ENDS.contains(&chars[i])) {
                end = idx + 1;
            }
        }
        segments.push(Segment {
            content: text[offsets[start]..offsets[end]].to_string(),
            overlap: if start == 0 { 0 } else { overlap },
            start,
        });
        if end >= n {
            break;
        }
        start = end - overlap;
    }
    segments
}
