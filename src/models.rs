//! Core data models used throughout ChatMuse.
//!
//! These types represent the pages, chunks, retrieval hits and chat turns
//! that flow through the ingestion and question-answering pipeline.

use serde::Serialize;

/// Text extracted from a single PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 0-based page index within the source document.
    pub index: usize,
    pub text: String,
}

/// A bounded text segment of a page, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Point ID in the vector store.
    pub id: String,
    /// Position of this chunk across the whole document, starting at 0.
    pub chunk_index: usize,
    /// Name of the uploaded file the chunk came from.
    pub source: String,
    /// Page the chunk came from.
    pub page: usize,
    pub text: String,
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: String,
    pub page: usize,
    /// Similarity reported by the store (higher is closer).
    pub score: f32,
}

/// One question and its answer. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}
