//! In-memory [`VectorStore`] implementation.
//!
//! Uses a `HashMap` of collections behind `std::sync::RwLock`. Search is
//! brute-force cosine similarity over every stored vector; ties keep
//! insertion order.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::RetrievedChunk;

use super::{PointRecord, StoreError, VectorStore};

struct Collection {
    dims: usize,
    points: Vec<PointRecord>,
}

/// In-memory store for offline runs and tests.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of points in a collection, or `None` if it does not exist.
    pub fn point_count(&self, collection: &str) -> Option<usize> {
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        collections.get(collection).map(|c| c.points.len())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn delete_collection(&self, collection: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        collections
            .remove(collection)
            .map(|_| ())
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))
    }

    async fn ensure_collection(&self, collection: &str, dims: usize) -> Result<(), StoreError> {
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection {
                dims,
                points: Vec::new(),
            });
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[PointRecord]) -> Result<(), StoreError> {
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() != stored.dims) {
            return Err(StoreError::DimensionMismatch {
                expected: stored.dims,
                actual: bad.vector.len(),
            });
        }

        for point in points {
            stored.points.retain(|p| p.id != point.id);
            stored.points.push(point.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        let stored = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        let mut hits: Vec<RetrievedChunk> = stored
            .points
            .iter()
            .map(|p| RetrievedChunk {
                text: p.text.clone(),
                source: p.source.clone(),
                page: p.page,
                score: cosine_similarity(vector, &p.vector),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, vector: Vec<f32>, text: &str) -> PointRecord {
        PointRecord {
            id: id.to_string(),
            vector,
            text: text.to_string(),
            source: "doc.pdf".to_string(),
            page: 0,
            chunk_index: 0,
        }
    }

    #[tokio::test]
    async fn test_delete_missing_collection_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.delete_collection("pdf_chunks").await.unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = InMemoryStore::new();
        store.ensure_collection("c", 2).await.unwrap();
        store
            .upsert(
                "c",
                &[
                    point("a", vec![0.0, 1.0], "far"),
                    point("b", vec![1.0, 0.0], "near"),
                    point("c", vec![1.0, 1.0], "middle"),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("c", &[1.0, 0.0], 2).await.unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["near", "middle"]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = InMemoryStore::new();
        store.ensure_collection("c", 2).await.unwrap();
        store.upsert("c", &[point("a", vec![1.0, 0.0], "old")]).await.unwrap();
        store.upsert("c", &[point("a", vec![1.0, 0.0], "new")]).await.unwrap();
        assert_eq!(store.point_count("c"), Some(1));
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimensions() {
        let store = InMemoryStore::new();
        store.ensure_collection("c", 3).await.unwrap();
        let err = store
            .upsert("c", &[point("a", vec![1.0, 0.0], "short")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_ensure_collection_keeps_existing_points() {
        let store = InMemoryStore::new();
        store.ensure_collection("c", 2).await.unwrap();
        store.upsert("c", &[point("a", vec![1.0, 0.0], "kept")]).await.unwrap();
        store.ensure_collection("c", 2).await.unwrap();
        assert_eq!(store.point_count("c"), Some(1));
    }
}
