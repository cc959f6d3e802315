//! Vector store abstraction.
//!
//! The [`VectorStore`] trait covers the handful of operations the pipeline
//! needs from an external vector database: drop a collection, create it if
//! absent, upsert embedded chunks, and run a similarity search. Backends:
//!
//! - [`qdrant::QdrantStore`]: Qdrant over its REST API.
//! - [`memory::InMemoryStore`]: brute-force cosine search in process, for
//!   offline use and tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod qdrant;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::StoreConfig;
use crate::models::RetrievedChunk;

/// Errors raised by vector store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named collection does not exist.
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    /// The store could not be reached at all.
    #[error("vector store unreachable at {url}: {message}")]
    Connectivity { url: String, message: String },

    /// The store answered with a non-success status.
    #[error("vector store error {status}: {body}")]
    Api { status: u16, body: String },

    /// A vector does not match the collection's dimensionality.
    #[error("vector has {actual} dimensions, collection expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The store answered with something we could not interpret.
    #[error("invalid vector store response: {0}")]
    InvalidResponse(String),
}

/// One embedded chunk as written to the store.
#[derive(Debug, Clone)]
pub struct PointRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub source: String,
    pub page: usize,
    pub chunk_index: usize,
}

/// Abstract vector database.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`delete_collection`](VectorStore::delete_collection) | Drop a collection; `CollectionNotFound` when absent |
/// | [`ensure_collection`](VectorStore::ensure_collection) | Create a cosine collection if absent |
/// | [`upsert`](VectorStore::upsert) | Insert or replace points by ID |
/// | [`search`](VectorStore::search) | Top-`limit` points by descending similarity |
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn delete_collection(&self, collection: &str) -> Result<(), StoreError>;

    async fn ensure_collection(&self, collection: &str, dims: usize) -> Result<(), StoreError>;

    async fn upsert(&self, collection: &str, points: &[PointRecord]) -> Result<(), StoreError>;

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError>;
}

/// Create the configured [`VectorStore`] backend.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.backend.as_str() {
        "qdrant" => Ok(Arc::new(qdrant::QdrantStore::new(config)?)),
        "memory" => Ok(Arc::new(memory::InMemoryStore::new())),
        other => anyhow::bail!("Unknown store backend: {}", other),
    }
}
