//! Top-k retrieval against an indexed collection.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::embedding::Embedder;
use crate::error::ChatError;
use crate::index::IndexHandle;
use crate::models::RetrievedChunk;
use crate::store::VectorStore;

/// Default number of chunks fed to the language model.
pub const DEFAULT_TOP_K: usize = 3;

/// A search handle bound to one collection and one embedding model.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    handle: IndexHandle,
    k: usize,
}

impl Retriever {
    /// Bind a retriever to `handle`.
    ///
    /// Fails with [`ChatError::ModelMismatch`] when `embedder` is not the
    /// model the collection was indexed with.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        handle: IndexHandle,
        k: usize,
    ) -> Result<Self, ChatError> {
        if embedder.model_name() != handle.model() {
            return Err(ChatError::ModelMismatch {
                collection: handle.collection().to_string(),
                indexed: handle.model().to_string(),
                query: embedder.model_name().to_string(),
            });
        }
        Ok(Self {
            embedder,
            store,
            handle,
            k: k.max(1),
        })
    }

    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Up to `k` chunks most similar to `query`, best first.
    ///
    /// Ordering is the store's own ranking; the store is never modified.
    pub async fn search(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let vector = self
            .embedder
            .embed_query(query)
            .await
            .map_err(|e| ChatError::Upstream {
                service: format!("embedding model '{}'", self.embedder.model_name()),
                message: format!("{:#}", e),
            })?;

        let hits = self
            .store
            .search(self.handle.collection(), &vector, self.k)
            .await?;

        debug!(
            "Retrieved {} chunks from '{}' (pages {:?})",
            hits.len(),
            self.handle.collection(),
            hits.iter().map(|h| h.page).collect::<Vec<_>>()
        );
        Ok(hits)
    }
}
