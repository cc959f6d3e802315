//! Qdrant backend over the REST API.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | delete | `DELETE /collections/{c}` |
//! | exists | `GET /collections/{c}` |
//! | create | `PUT /collections/{c}` with cosine distance |
//! | upsert | `PUT /collections/{c}/points?wait=true` |
//! | search | `POST /collections/{c}/points/search` |
//!
//! Point payloads carry the chunk text under `page_content` and provenance
//! under `metadata` (`source`, `page`, `chunk_index`).
//!
//! Requests are never retried. An unreachable server surfaces as
//! [`StoreError::Connectivity`].

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::StoreConfig;
use crate::models::RetrievedChunk;

use super::{PointRecord, StoreError, VectorStore};

pub struct QdrantStore {
    client: reqwest::Client,
    url: String,
    batch_size: usize,
}

impl QdrantStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            url: config.url.trim_end_matches('/').to_string(),
            batch_size: config.upsert_batch_size.max(1),
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}", self.url, collection)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        request.send().await.map_err(|e| StoreError::Connectivity {
            url: self.url.clone(),
            message: e.to_string(),
        })
    }

    /// Turn a response into its JSON body, mapping 404 to `CollectionNotFound`.
    async fn read(&self, collection: &str, response: Response) -> Result<Value, StoreError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn delete_collection(&self, collection: &str) -> Result<(), StoreError> {
        let url = self.collection_url(collection);
        debug!("Qdrant DELETE {}", url);
        let response = self.send(self.client.delete(&url)).await?;
        let body = self.read(collection, response).await?;

        // Some Qdrant versions answer 200 with `result: false` for a missing collection
        if body.get("result").and_then(Value::as_bool) == Some(false) {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }
        Ok(())
    }

    async fn ensure_collection(&self, collection: &str, dims: usize) -> Result<(), StoreError> {
        let url = self.collection_url(collection);
        let response = self.send(self.client.get(&url)).await?;
        match self.read(collection, response).await {
            Ok(_) => return Ok(()),
            Err(StoreError::CollectionNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        debug!("Creating Qdrant collection '{}' ({} dims)", collection, dims);
        let body = json!({
            "vectors": { "size": dims, "distance": "Cosine" }
        });
        let response = self.send(self.client.put(&url).json(&body)).await?;
        self.read(collection, response).await?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[PointRecord]) -> Result<(), StoreError> {
        let url = format!("{}/points?wait=true", self.collection_url(collection));

        for batch in points.chunks(self.batch_size) {
            let body = json!({
                "points": batch.iter().map(point_json).collect::<Vec<_>>()
            });
            debug!("Qdrant upsert of {} points into '{}'", batch.len(), collection);
            let response = self.send(self.client.put(&url).json(&body)).await?;
            self.read(collection, response).await?;
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let url = format!("{}/points/search", self.collection_url(collection));
        let body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        let response = self.send(self.client.post(&url).json(&body)).await?;
        let json = self.read(collection, response).await?;
        parse_search_response(&json)
    }
}

fn point_json(point: &PointRecord) -> Value {
    json!({
        "id": point.id,
        "vector": point.vector,
        "payload": {
            "page_content": point.text,
            "metadata": {
                "source": point.source,
                "page": point.page,
                "chunk_index": point.chunk_index,
            }
        }
    })
}

fn parse_search_response(json: &Value) -> Result<Vec<RetrievedChunk>, StoreError> {
    let hits = json
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::InvalidResponse("missing result array".to_string()))?;

    hits.iter()
        .map(|hit| {
            let payload = hit
                .get("payload")
                .ok_or_else(|| StoreError::InvalidResponse("hit without payload".to_string()))?;
            let text = payload
                .get("page_content")
                .and_then(Value::as_str)
                .ok_or_else(|| StoreError::InvalidResponse("payload without page_content".to_string()))?;
            let metadata = payload.get("metadata");
            Ok(RetrievedChunk {
                text: text.to_string(),
                source: metadata
                    .and_then(|m| m.get("source"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                page: metadata
                    .and_then(|m| m.get("page"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as usize,
                score: hit.get("score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn store_for(server: &mockito::Server) -> QdrantStore {
        QdrantStore::new(&StoreConfig {
            url: server.url(),
            upsert_batch_size: 2,
            ..StoreConfig::default()
        })
        .unwrap()
    }

    fn record(id: &str) -> PointRecord {
        PointRecord {
            id: id.to_string(),
            vector: vec![0.5, 0.5],
            text: format!("text {}", id),
            source: "doc.pdf".to_string(),
            page: 3,
            chunk_index: 0,
        }
    }

    #[tokio::test]
    async fn test_delete_missing_collection_maps_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/collections/pdf_chunks")
            .with_status(404)
            .with_body(r#"{"status":{"error":"Not found: Collection `pdf_chunks` doesn't exist!"}}"#)
            .create_async()
            .await;

        let err = store_for(&server)
            .delete_collection("pdf_chunks")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_false_result_maps_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/collections/pdf_chunks")
            .with_status(200)
            .with_body(r#"{"result":false,"status":"ok"}"#)
            .create_async()
            .await;

        let err = store_for(&server)
            .delete_collection("pdf_chunks")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/collections/pdf_chunks")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = store_for(&server)
            .delete_collection("pdf_chunks")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connectivity_error() {
        let store = QdrantStore::new(&StoreConfig {
            url: "http://127.0.0.1:9".to_string(),
            ..StoreConfig::default()
        })
        .unwrap();
        let err = store.delete_collection("pdf_chunks").await.unwrap_err();
        assert!(matches!(err, StoreError::Connectivity { .. }));
    }

    #[tokio::test]
    async fn test_ensure_collection_creates_when_missing() {
        let mut server = mockito::Server::new_async().await;
        let _get = server
            .mock("GET", "/collections/pdf_chunks")
            .with_status(404)
            .create_async()
            .await;
        let put = server
            .mock("PUT", "/collections/pdf_chunks")
            .match_body(Matcher::PartialJson(json!({
                "vectors": { "size": 384, "distance": "Cosine" }
            })))
            .with_status(200)
            .with_body(r#"{"result":true,"status":"ok"}"#)
            .create_async()
            .await;

        store_for(&server)
            .ensure_collection("pdf_chunks", 384)
            .await
            .unwrap();
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_upsert_sends_batches() {
        let mut server = mockito::Server::new_async().await;
        let put = server
            .mock("PUT", "/collections/pdf_chunks/points")
            .match_query(Matcher::UrlEncoded("wait".into(), "true".into()))
            .with_status(200)
            .with_body(r#"{"result":{"status":"completed"},"status":"ok"}"#)
            .expect(2)
            .create_async()
            .await;

        store_for(&server)
            .upsert("pdf_chunks", &[record("1"), record("2"), record("3")])
            .await
            .unwrap();
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_parses_hits() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/collections/pdf_chunks/points/search")
            .match_body(Matcher::PartialJson(json!({ "limit": 3, "with_payload": true })))
            .with_status(200)
            .with_body(
                r#"{"result":[
                    {"id":"a","score":0.9,"payload":{"page_content":"first","metadata":{"source":"doc.pdf","page":2}}},
                    {"id":"b","score":0.4,"payload":{"page_content":"second","metadata":{"source":"doc.pdf","page":5}}}
                ],"status":"ok"}"#,
            )
            .create_async()
            .await;

        let hits = store_for(&server)
            .search("pdf_chunks", &[0.1, 0.2], 3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "first");
        assert_eq!(hits[0].page, 2);
        assert_eq!(hits[1].source, "doc.pdf");
        assert!((hits[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_point_json_shape() {
        let value = point_json(&record("7"));
        assert_eq!(value["payload"]["page_content"], "text 7");
        assert_eq!(value["payload"]["metadata"]["page"], 3);
    }
}
