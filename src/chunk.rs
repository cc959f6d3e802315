//! Recursive character text chunker.
//!
//! Splits page text into chunks of at most `chunk_size` characters, carrying
//! up to `chunk_overlap` characters from the end of one chunk into the start
//! of the next. Splitting tries paragraph breaks (`\n\n`) first, then line
//! breaks, then spaces, and only cuts between arbitrary characters when a
//! piece has no softer boundary left.
//!
//! Lengths are counted in `char`s, never bytes, so multi-byte text is never
//! cut mid-codepoint.

use std::collections::VecDeque;

use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::{Chunk, Page};

/// Boundaries tried in order. The empty separator means "between characters".
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Chunk every page of a document, keeping page provenance.
    ///
    /// `chunk_index` is contiguous across the whole document, starting at 0.
    pub fn chunk_pages(&self, source: &str, pages: &[Page]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in pages {
            for text in self.split_text(&page.text) {
                chunks.push(Chunk {
                    id: Uuid::new_v4().to_string(),
                    chunk_index: chunks.len(),
                    source: source.to_string(),
                    page: page.index,
                    text,
                });
            }
        }
        chunks
    }

    /// Split a single text. Empty or whitespace-only input yields no chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators[separators.len() - 1];
        let mut finer: &[&str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = candidate;
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            // Too long on its own: flush what fits, then go one level finer
            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending));
        }

        chunks
    }

    /// Greedily pack pieces into chunks, seeding each new chunk with the tail
    /// of the previous one while that tail fits in `chunk_overlap`.
    fn merge_pieces(&self, pieces: &[String]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join_window(&window) {
                    merged.push(chunk);
                }
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        if let Some(chunk) = join_window(&window) {
            merged.push(chunk);
        }

        merged
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

/// Split on `separator`, attaching it to the start of the following piece.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut parts = text.split(separator);
    let mut pieces = Vec::new();
    if let Some(first) = parts.next() {
        pieces.push(first.to_string());
    }
    for part in parts {
        pieces.push(format!("{}{}", separator, part));
    }
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
