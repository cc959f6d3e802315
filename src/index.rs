//! Embedding/index client.
//!
//! Bridges the chunker and the vector store: [`IndexClient::reset`] drops a
//! collection, [`IndexClient::index`] embeds chunks and upserts them, handing
//! back an [`IndexHandle`] bound to the collection for later retrieval.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::models::Chunk;
use crate::store::{PointRecord, StoreError, VectorStore};

/// Opaque reference to an indexed collection.
///
/// Records the embedding model used at indexing time; queries against the
/// handle must be embedded with the same model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexHandle {
    collection: String,
    model: String,
    dims: usize,
    chunk_count: usize,
}

impl IndexHandle {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }
}

pub struct IndexClient {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl IndexClient {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Drop `collection` if it exists. A missing collection is not an error.
    pub async fn reset(&self, collection: &str) -> Result<(), StoreError> {
        match self.store.delete_collection(collection).await {
            Ok(()) => {
                info!("Old collection '{}' cleared", collection);
                Ok(())
            }
            Err(StoreError::CollectionNotFound(_)) => {
                debug!("Collection '{}' did not exist; nothing to clear", collection);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Embed every chunk and upsert it into `collection`, creating the
    /// collection if needed.
    pub async fn index(&self, chunks: &[Chunk], collection: &str) -> Result<IndexHandle> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .context("Failed to embed chunks")?;

        if vectors.len() != chunks.len() {
            bail!(
                "Embedding model returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            );
        }

        let dims = vectors
            .first()
            .map(Vec::len)
            .unwrap_or_else(|| self.embedder.dims());

        self.store.ensure_collection(collection, dims).await?;

        let points: Vec<PointRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| PointRecord {
                id: chunk.id.clone(),
                vector,
                text: chunk.text.clone(),
                source: chunk.source.clone(),
                page: chunk.page,
                chunk_index: chunk.chunk_index,
            })
            .collect();

        self.store.upsert(collection, &points).await?;

        info!(
            "Indexed {} chunks into '{}' with {}",
            points.len(),
            collection,
            self.embedder.model_name()
        );

        Ok(IndexHandle {
            collection: collection.to_string(),
            model: self.embedder.model_name().to_string(),
            dims,
            chunk_count: points.len(),
        })
    }
}

#[cfg(test)]
impl IndexHandle {
    pub(crate) fn for_tests(collection: &str, model: &str, dims: usize) -> Self {
        Self {
            collection: collection.to_string(),
            model: model.to_string(),
            dims,
            chunk_count: 0,
        }
    }
}
