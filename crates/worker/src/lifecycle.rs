//! Read side of the crawl lifecycle tracker (spec §4.5 "Metrics read API").
//! The write side — `upsert_crawl_started`/`complete_crawl`/`mark_crawl_failed`
//! — is simple enough to live directly on `PostgresClient` and is called
//! straight from the webhook router.

use std::sync::Arc;

use bridge_common::types::{CrawlSession, OperationMetric};
use bridge_common::{BridgeError, Result};
use bridge_storage::PostgresClient;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CrawlMetricsResponse {
    #[serde(flatten)]
    pub session: CrawlSession,
    pub per_page: Option<Vec<OperationMetric>>,
}

pub struct LifecycleTracker {
    postgres: Arc<PostgresClient>,
}

impl LifecycleTracker {
    pub fn new(postgres: Arc<PostgresClient>) -> Self {
        Self { postgres }
    }

    pub async fn get_metrics(&self, job_id: &str, include_per_page: bool) -> Result<CrawlMetricsResponse> {
        let session = self
            .postgres
            .get_crawl_session(job_id)
            .await?
            .ok_or_else(|| BridgeError::NotFound(format!("crawl job {job_id} not found")))?;

        let per_page = if include_per_page {
            Some(self.postgres.list_operation_metrics_for_crawl(job_id).await?)
        } else {
            None
        };

        Ok(CrawlMetricsResponse { session, per_page })
    }
}
