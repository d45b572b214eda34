//! Seam between the webhook router (producer) and the batch indexing worker
//! (consumer), so `webhook` never has to depend on `worker` (spec §4.1/§4.2).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::DocumentPayload;
use crate::Result;

/// One unit of work for the batch indexing worker: the documents of a
/// single `crawl.page` delivery (or a direct `/api/index` call), tagged
/// with the owning crawl correlation id, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub documents: Vec<DocumentPayload>,
    pub crawl_id: Option<String>,
    pub request_id: Option<String>,
}

#[async_trait]
pub trait IndexQueue: Send + Sync {
    async fn enqueue_batch(&self, job: BatchJob) -> Result<()>;
}
