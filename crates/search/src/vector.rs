//! Trait seam between the orchestrator and the concrete vector store, so the
//! orchestrator's fan-out/fusion logic is testable without a live Qdrant.

use async_trait::async_trait;
use bridge_common::types::{BackendHit, SearchFilters};
use bridge_common::Result;
use bridge_storage::QdrantClient;

#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(&self, query_vector: Vec<f32>, limit: u64, filters: &SearchFilters) -> Result<Vec<BackendHit>>;
}

#[async_trait]
impl VectorSearch for QdrantClient {
    async fn search(&self, query_vector: Vec<f32>, limit: u64, filters: &SearchFilters) -> Result<Vec<BackendHit>> {
        QdrantClient::search(self, query_vector, limit, filters).await
    }
}
