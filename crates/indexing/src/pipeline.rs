//! The five-step document indexing pipeline (spec §4.3).

use std::sync::Arc;
use std::time::Instant;

use bridge_common::types::{DocumentChunkPayload, DocumentPayload, DocumentResult};
use bridge_common::Embedder;
use bridge_search::bm25::{Bm25Engine, Bm25Metadata};
use bridge_storage::{PostgresClient, QdrantClient, RedisCache};
use chrono::Utc;
use serde_json::json;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::canonical;
use crate::chunker::MarkdownChunker;

/// Namespace for deterministic per-chunk point ids, so re-indexing the same
/// `(canonical_url, chunk_index)` overwrites rather than accumulates
/// (spec §5: "a later successful re-index must overwrite earlier vectors").
const CHUNK_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x3b, 0x3a, 0x0e, 0x2f, 0x1c, 0x7b, 0x4a, 0x9d, 0x8e, 0x11, 0x5c, 0x2a, 0x77, 0x61, 0x9f, 0x04,
]);

pub struct IndexingPipeline {
    postgres: Arc<PostgresClient>,
    qdrant: Arc<QdrantClient>,
    redis: Arc<RedisCache>,
    bm25: Arc<Bm25Engine>,
    embedder: Arc<dyn Embedder>,
    chunker: MarkdownChunker,
    tracking_param_strip: bool,
}

impl IndexingPipeline {
    pub fn new(
        postgres: Arc<PostgresClient>,
        qdrant: Arc<QdrantClient>,
        redis: Arc<RedisCache>,
        bm25: Arc<Bm25Engine>,
        embedder: Arc<dyn Embedder>,
        tracking_param_strip: bool,
    ) -> Self {
        Self { postgres, qdrant, redis, bm25, embedder, chunker: MarkdownChunker::default(), tracking_param_strip }
    }

    /// Canonicalizes a URL the same way `index_document` does, so callers
    /// that index a document out-of-band (the rescrape job) can compute the
    /// cache key `index_document` would have used.
    pub fn canonicalize(&self, url: &str) -> String {
        canonical::normalize(url, self.tracking_param_strip)
    }

    /// Indexes one scraped document end-to-end. Never returns `Err` —
    /// per-document failures are reported in the returned `DocumentResult`
    /// so one bad document never cancels the rest of a batch (spec §4.2).
    #[instrument(skip(self, doc), fields(url = %doc.url))]
    pub async fn index_document(
        &self,
        doc: DocumentPayload,
        crawl_id: Option<&str>,
        request_id: Option<&str>,
    ) -> DocumentResult {
        if let Err(err) = canonical::require_http_scheme(&doc.url) {
            return DocumentResult {
                success: false,
                url: doc.url,
                error: Some(err),
                error_type: Some("ValidationError".to_string()),
            };
        }

        let canonical_url = canonical::normalize(&doc.url, self.tracking_param_strip);

        self.persist_content_fire_and_forget(&doc, &canonical_url, crawl_id);

        let chunking_start = Instant::now();
        let chunks = self.chunker.chunk(&doc.markdown);
        let chunking_ms = chunking_start.elapsed().as_millis() as i64;
        self.record_metric("chunking", "chunk_document", chunking_ms, !chunks.is_empty(), request_id, crawl_id, &doc.url)
            .await;

        if chunks.is_empty() {
            return DocumentResult {
                success: false,
                url: doc.url,
                error: Some("document produced no chunks".to_string()),
                error_type: Some("ValidationError".to_string()),
            };
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embed_start = Instant::now();
        let embeddings = match self.embedder.embed_batch(&texts).await {
            Ok(vectors) => {
                let ms = embed_start.elapsed().as_millis() as i64;
                self.record_metric("embedding", "embed_chunks", ms, true, request_id, crawl_id, &doc.url).await;
                vectors
            }
            Err(err) => {
                let ms = embed_start.elapsed().as_millis() as i64;
                self.record_metric("embedding", "embed_chunks", ms, false, request_id, crawl_id, &doc.url).await;
                return DocumentResult {
                    success: false,
                    url: doc.url,
                    error: Some(err.to_string()),
                    error_type: Some("EmbeddingError".to_string()),
                };
            }
        };

        let doc_id = Bm25Engine::stable_hash(&canonical_url);
        let indexed_at = Utc::now();

        let points: Vec<(Uuid, Vec<f32>, DocumentChunkPayload)> = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, vector)| {
                let point_id = Uuid::new_v5(&CHUNK_ID_NAMESPACE, format!("{doc_id}:{}", chunk.index).as_bytes());
                let payload = DocumentChunkPayload {
                    url: doc.url.clone(),
                    canonical_url: canonical_url.clone(),
                    title: doc.title.clone(),
                    text: chunk.text.clone(),
                    chunk_index: chunk.index,
                    crawl_session_id: crawl_id.map(|s| s.to_string()),
                    indexed_at,
                };
                (point_id, vector.clone(), payload)
            })
            .collect();

        let vector_start = Instant::now();
        if let Err(err) = self.qdrant.upsert_chunks(points).await {
            let ms = vector_start.elapsed().as_millis() as i64;
            self.record_metric("qdrant", "upsert_chunks", ms, false, request_id, crawl_id, &doc.url).await;
            return DocumentResult {
                success: false,
                url: doc.url,
                error: Some(err.to_string()),
                error_type: Some("VectorStoreError".to_string()),
            };
        }
        let vector_ms = vector_start.elapsed().as_millis() as i64;
        self.record_metric("qdrant", "upsert_chunks", vector_ms, true, request_id, crawl_id, &doc.url).await;

        let bm25_start = Instant::now();
        let whole_document_text = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n\n");
        let tokens = Bm25Engine::tokenize(&whole_document_text);
        self.bm25
            .index(
                &doc_id,
                &tokens,
                Bm25Metadata {
                    url: doc.url.clone(),
                    canonical_url: canonical_url.clone(),
                    title: doc.title.clone(),
                    text: whole_document_text,
                    chunk_index: None,
                    crawl_session_id: crawl_id.map(|s| s.to_string()),
                },
            )
            .await;
        let bm25_ms = bm25_start.elapsed().as_millis() as i64;
        self.record_metric("bm25", "index_chunks", bm25_ms, true, request_id, crawl_id, &doc.url).await;

        DocumentResult { success: true, url: doc.url, error: None, error_type: None }
    }

    fn persist_content_fire_and_forget(&self, doc: &DocumentPayload, canonical_url: &str, crawl_id: Option<&str>) {
        let Some(crawl_id) = crawl_id else { return };
        let postgres = self.postgres.clone();
        let redis = self.redis.clone();
        let crawl_id = crawl_id.to_string();
        let canonical_url = canonical_url.to_string();
        let url = doc.url.clone();
        let markdown = doc.markdown.clone();
        let title = doc.title.clone();
        let description = doc.description.clone();
        let links = serde_json::to_value(&doc.links).unwrap_or_else(|_| json!({}));
        let metadata = doc.metadata.clone();
        let screenshot = doc.screenshot.clone();
        let source_url = doc.resolved_url.clone();

        tokio::spawn(async move {
            match postgres
                .upsert_scraped_content(
                    &crawl_id,
                    &url,
                    &canonical_url,
                    source_url.as_deref(),
                    "scraper",
                    &markdown,
                    title.as_deref(),
                    description.as_deref(),
                    links,
                    metadata,
                    screenshot.as_deref(),
                )
                .await
            {
                Ok(_) => {
                    if let Err(err) = redis.invalidate(&canonical_url).await {
                        warn!(url = %url, error = %err, "failed to invalidate content cache after write");
                    }
                }
                Err(err) => {
                    warn!(url = %url, error = %err, "failed to persist scraped content; indexing continues");
                }
            }
        });
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_metric(
        &self,
        operation_type: &str,
        operation_name: &str,
        duration_ms: i64,
        success: bool,
        request_id: Option<&str>,
        crawl_id: Option<&str>,
        document_url: &str,
    ) {
        if let Err(err) = self
            .postgres
            .insert_operation_metric(
                operation_type,
                operation_name,
                duration_ms,
                success,
                request_id,
                crawl_id,
                Some(document_url),
                json!({}),
            )
            .await
        {
            warn!(operation_type, error = %err, "failed to record operation metric");
        }
    }
}
