//! Dense-vector store: one collection holding document chunks, queried by
//! cosine similarity and optionally filtered by canonical URL, host or
//! crawl session (spec §4.4).

use bridge_common::types::{BackendHit, DocumentChunkPayload, SearchFilters};
use bridge_common::{BridgeError, Result};
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::json;
use uuid::Uuid;

pub struct QdrantClient {
    inner: Qdrant,
    collection: String,
}

impl QdrantClient {
    pub async fn new(url: &str, collection: impl Into<String>) -> Result<Self> {
        let inner = Qdrant::from_url(url)
            .build()
            .map_err(|e| BridgeError::ServiceUnavailable(e.to_string()))?;
        Ok(Self { inner, collection: collection.into() })
    }

    /// Used by `GET /health` (spec §6) to report the vector store as one of
    /// the dependency subsets.
    pub async fn health(&self) -> Result<()> {
        self.inner
            .collection_exists(&self.collection)
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Idempotent: callers invoke this at startup, ignoring "already exists".
    pub async fn ensure_collection(&self, vector_size: u64) -> Result<()> {
        let exists = self
            .inner
            .collection_exists(&self.collection)
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(e.to_string()))?;
        if exists {
            return Ok(());
        }
        self.inner
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Batch upsert of embedded chunks (spec §4.3 step 4). Point ids are
    /// caller-supplied so a re-index of the same document overwrites its
    /// prior chunks rather than accumulating duplicates.
    pub async fn upsert_chunks(
        &self,
        chunks: Vec<(Uuid, Vec<f32>, DocumentChunkPayload)>,
    ) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let points: Vec<PointStruct> = chunks
            .into_iter()
            .map(|(id, vector, payload)| {
                let payload_json = json!({
                    "url": payload.url,
                    "canonical_url": payload.canonical_url,
                    "title": payload.title,
                    "text": payload.text,
                    "chunk_index": payload.chunk_index,
                    "crawl_session_id": payload.crawl_session_id,
                    "indexed_at": payload.indexed_at.to_rfc3339(),
                });
                let payload: qdrant_client::Payload = payload_json
                    .try_into()
                    .unwrap_or_else(|_| qdrant_client::Payload::new());
                PointStruct::new(id.to_string(), vector, payload)
            })
            .collect();

        self.inner
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Filtered similarity search (spec §4.4). `limit` is the oversampled
    /// per-backend fetch count chosen by the search orchestrator, not the
    /// user-facing result count.
    pub async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
        filters: &SearchFilters,
    ) -> Result<Vec<BackendHit>> {
        let mut builder = SearchPointsBuilder::new(&self.collection, query_vector, limit)
            .with_payload(true);
        if let Some(filter) = build_filter(filters) {
            builder = builder.filter(filter);
        }
        let response = self
            .inner
            .search_points(builder)
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(e.to_string()))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|scored| {
                let payload = scored.payload;
                Some(BackendHit {
                    id: match scored.id?.point_id_options? {
                        qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u) => u,
                        qdrant_client::qdrant::point_id::PointIdOptions::Num(n) => n.to_string(),
                    },
                    url: string_field(&payload, "url").unwrap_or_default(),
                    canonical_url: string_field(&payload, "canonical_url"),
                    title: string_field(&payload, "title"),
                    text: string_field(&payload, "text").unwrap_or_default(),
                    score: scored.score as f64,
                    chunk_index: payload
                        .get("chunk_index")
                        .and_then(|v| v.as_integer())
                        .map(|n| n as usize),
                })
            })
            .collect())
    }
}

fn build_filter(filters: &SearchFilters) -> Option<Filter> {
    let mut conditions = Vec::new();
    if let Some(canonical_url) = &filters.canonical_url {
        conditions.push(Condition::matches("canonical_url", canonical_url.clone()));
    }
    if let Some(crawl_session_id) = &filters.crawl_session_id {
        conditions.push(Condition::matches("crawl_session_id", crawl_session_id.clone()));
    }
    // host is not stored as its own payload field; applied as a prefix match
    // against url at the fusion/orchestrator layer instead.
    if conditions.is_empty() {
        None
    } else {
        Some(Filter::must(conditions))
    }
}

fn string_field(
    payload: &std::collections::HashMap<String, qdrant_client::qdrant::Value>,
    key: &str,
) -> Option<String> {
    payload.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}
