//! Hybrid search orchestration: parallel backend fan-out with graceful
//! degradation, then reciprocal-rank fusion (spec §4.4).

use std::sync::Arc;

use bridge_common::types::{BackendHit, SearchFilters, SearchMode, SearchResult};
use bridge_common::{BridgeError, Embedder, Result};
use tracing::warn;

use crate::bm25::Bm25Engine;
use crate::fusion::reciprocal_rank_fusion;
use crate::vector::VectorSearch;

const DEFAULT_OVERSAMPLE_FACTOR: u64 = 2;
const DEFAULT_RRF_K: f64 = 60.0;

pub struct SearchOrchestrator {
    vector: Arc<dyn VectorSearch>,
    bm25: Arc<Bm25Engine>,
    embedder: Arc<dyn Embedder>,
    oversample_factor: u64,
    rrf_k: f64,
}

impl SearchOrchestrator {
    pub fn new(vector: Arc<dyn VectorSearch>, bm25: Arc<Bm25Engine>, embedder: Arc<dyn Embedder>) -> Self {
        Self { vector, bm25, embedder, oversample_factor: DEFAULT_OVERSAMPLE_FACTOR, rrf_k: DEFAULT_RRF_K }
    }

    pub async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        let fetch_limit = (limit as u64).saturating_mul(self.oversample_factor).max(limit as u64);

        match mode {
            SearchMode::Vector => {
                let hits = self.fetch_vector(query, fetch_limit, filters).await?;
                Ok(reciprocal_rank_fusion(&hits, &[], self.rrf_k, limit))
            }
            SearchMode::Bm25 => {
                let hits = self.fetch_bm25(query, fetch_limit as usize, filters).await;
                Ok(reciprocal_rank_fusion(&[], &hits, self.rrf_k, limit))
            }
            SearchMode::Hybrid => self.search_hybrid(query, fetch_limit, limit, filters).await,
        }
    }

    async fn search_hybrid(
        &self,
        query: &str,
        fetch_limit: u64,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        let (vector_result, bm25_hits) = tokio::join!(
            self.fetch_vector(query, fetch_limit, filters),
            self.fetch_bm25(query, fetch_limit as usize, filters),
        );

        match vector_result {
            Ok(vector_hits) => Ok(reciprocal_rank_fusion(&vector_hits, &bm25_hits, self.rrf_k, limit)),
            Err(err) => {
                if bm25_hits.is_empty() {
                    warn!(error = %err, "vector backend failed and bm25 returned no hits");
                    return Err(BridgeError::ServiceUnavailable(format!(
                        "both search backends unavailable: vector error: {err}"
                    )));
                }
                warn!(error = %err, "vector backend failed; degrading to bm25-only results");
                Ok(reciprocal_rank_fusion(&[], &bm25_hits, self.rrf_k, limit))
            }
        }
    }

    async fn fetch_vector(&self, query: &str, limit: u64, filters: &SearchFilters) -> Result<Vec<BackendHit>> {
        let query_vector = self.embedder.embed_one(query).await?;
        let mut hits = self.vector.search(query_vector, limit, filters).await?;
        apply_host_filter(&mut hits, filters);
        Ok(hits)
    }

    async fn fetch_bm25(&self, query: &str, limit: usize, filters: &SearchFilters) -> Vec<BackendHit> {
        self.bm25.search(query, limit, filters).await
    }
}

/// Qdrant payloads don't carry a standalone `host` field, so host filtering
/// for vector hits is applied here rather than pushed into the Qdrant query
/// (see `build_filter` in `bridge_storage::qdrant`).
fn apply_host_filter(hits: &mut Vec<BackendHit>, filters: &SearchFilters) {
    if let Some(host) = &filters.host {
        hits.retain(|hit| hit.url.contains(host.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0, 1.0]).collect())
        }
    }

    struct FailingVectorSearch;

    #[async_trait]
    impl VectorSearch for FailingVectorSearch {
        async fn search(&self, _query_vector: Vec<f32>, _limit: u64, _filters: &SearchFilters) -> Result<Vec<BackendHit>> {
            Err(BridgeError::ServiceUnavailable("qdrant is down".to_string()))
        }
    }

    struct StubVectorSearch(Vec<BackendHit>);

    #[async_trait]
    impl VectorSearch for StubVectorSearch {
        async fn search(&self, _query_vector: Vec<f32>, _limit: u64, _filters: &SearchFilters) -> Result<Vec<BackendHit>> {
            Ok(self.0.clone())
        }
    }

    fn hit(id: &str, url: &str) -> BackendHit {
        BackendHit {
            id: id.to_string(),
            url: url.to_string(),
            canonical_url: Some(url.to_string()),
            title: None,
            text: "some matching text".to_string(),
            score: 1.0,
            chunk_index: Some(0),
        }
    }

    #[tokio::test]
    async fn hybrid_degrades_to_bm25_when_vector_backend_fails() {
        let bm25 = Arc::new(Bm25Engine::new());
        bm25.index(
            "doc-1",
            &Bm25Engine::tokenize("some matching text"),
            crate::bm25::Bm25Metadata {
                url: "https://example.com/a".to_string(),
                canonical_url: "https://example.com/a".to_string(),
                title: None,
                text: "some matching text".to_string(),
                chunk_index: Some(0),
                crawl_session_id: None,
            },
        )
        .await;

        let orchestrator = SearchOrchestrator::new(Arc::new(FailingVectorSearch), bm25, Arc::new(StubEmbedder));

        let results = orchestrator
            .search("matching", SearchMode::Hybrid, 10, &SearchFilters::default())
            .await
            .expect("should degrade instead of erroring");
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn hybrid_errors_when_both_backends_fail() {
        let bm25 = Arc::new(Bm25Engine::new());
        let orchestrator = SearchOrchestrator::new(Arc::new(FailingVectorSearch), bm25, Arc::new(StubEmbedder));

        let err = orchestrator
            .search("nothing indexed", SearchMode::Hybrid, 10, &SearchFilters::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn vector_only_mode_skips_bm25_backend() {
        let bm25 = Arc::new(Bm25Engine::new());
        let vector_hits = vec![hit("v1", "https://example.com/v1")];
        let orchestrator = SearchOrchestrator::new(Arc::new(StubVectorSearch(vector_hits)), bm25, Arc::new(StubEmbedder));

        let results = orchestrator
            .search("anything", SearchMode::Vector, 10, &SearchFilters::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://example.com/v1");
    }

    #[tokio::test]
    async fn host_filter_applies_to_vector_hits() {
        let bm25 = Arc::new(Bm25Engine::new());
        let vector_hits = vec![hit("v1", "https://example.com/v1"), hit("v2", "https://other.com/v2")];
        let orchestrator = SearchOrchestrator::new(Arc::new(StubVectorSearch(vector_hits)), bm25, Arc::new(StubEmbedder));

        let filters = SearchFilters { host: Some("example.com".to_string()), ..Default::default() };
        let results = orchestrator.search("anything", SearchMode::Vector, 10, &filters).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://example.com/v1");
    }
}
