//! Seam between the indexing pipeline (which produces the concrete HTTP
//! client, `crates/indexing/src/embedder.rs`) and the search orchestrator
//! (which only needs to turn a query string into a vector). Living here
//! instead of in either crate keeps `search` from depending on `indexing`.

use async_trait::async_trait;

use crate::Result;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        Ok(batch.pop().unwrap_or_default())
    }
}
