//! Recursive text splitting with overlap.

use std::collections::VecDeque;

use tracing::debug;

use crate::models::{Chunk, ChunkMetadata, IndexingConfig};
use crate::utils::clean_text;

/// Separators tried from coarsest to finest. The empty separator cuts
/// between characters.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Splits text into overlapping chunks, preferring paragraph, then line,
/// then sentence, then word boundaries.
///
/// Sizes are measured in characters. A separator stays attached to the end of
/// the piece it follows, so sentences keep their period.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(config: &IndexingConfig) -> Self {
        Self::with_sizes(config.chunk_size as usize, config.chunk_overlap as usize)
    }

    /// `overlap` is clamped below `chunk_size`.
    pub fn with_sizes(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&IndexingConfig::default())
    }

    /// Normalize `text` and split it into chunks carrying `base` metadata plus
    /// their position. Empty input yields no chunks.
    pub fn chunk(&self, text: &str, base: &ChunkMetadata) -> Vec<Chunk> {
        let cleaned = clean_text(text);
        if cleaned.is_empty() {
            debug!("nothing to chunk for '{}' after cleaning", base.source);
            return Vec::new();
        }

        let pieces = self.split_text(&cleaned);
        let total = pieces.len() as u32;

        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .enumerate()
            .map(|(idx, text)| {
                let mut metadata = base.clone();
                metadata.chunk_index = idx as u32;
                metadata.total_chunks = total;
                Chunk::new(text, metadata)
            })
            .collect();

        debug!("split '{}' into {} chunks", base.source, chunks.len());
        chunks
    }

    /// Split already-normalized text. Deterministic for a given configuration.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, finer) = pick_separator(text, separators);
        let mut chunks = Vec::new();
        let mut fitting: Vec<(&str, usize)> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            let len = piece.chars().count();
            if len < self.chunk_size {
                fitting.push((piece, len));
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }

            if finer.is_empty() {
                push_trimmed(&mut chunks, piece);
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }

        chunks
    }

    /// Greedily pack pieces into chunks of at most `chunk_size` characters,
    /// carrying up to `overlap` trailing characters into the next chunk.
    fn merge(&self, pieces: &[(&str, usize)]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for &(piece, len) in pieces {
            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut docs, &join(&window));

                while total > self.overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        push_trimmed(&mut docs, &join(&window));
        docs
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// The coarsest separator present in `text`, and the finer ones after it.
fn pick_separator<'s>(text: &str, separators: &'s [&'s str]) -> (&'s str, &'s [&'s str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return ("", &[]);
        }
        if text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split_inclusive(separator).collect()
    }
}

fn join(window: &VecDeque<(&str, usize)>) -> String {
    window.iter().map(|(piece, _)| *piece).collect()
}

fn push_trimmed(docs: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}
