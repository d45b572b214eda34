//! Seam between the webhook router and the change-detection mirror (spec
//! §4.7 auto-watch). Kept as a trait here so `webhook` doesn't need to
//! depend on `worker`'s HTTP client.

use async_trait::async_trait;

use crate::Result;

#[async_trait]
pub trait AutoWatch: Send + Sync {
    /// Best-effort, idempotent: looks up an existing watch for `url` first,
    /// creates one only if absent, and treats HTTP 409 as success. Callers
    /// log failures and never propagate them back to the webhook response.
    async fn ensure_watch(&self, url: &str) -> Result<()>;
}
