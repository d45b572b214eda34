//! Routes verified webhook events to their durable side effects (spec
//! §4.1). Never blocks the caller on the indexing pipeline itself — page
//! events only enqueue; the batch worker does the heavy lifting.

use std::sync::Arc;

use bridge_common::{BatchJob, BridgeError, IndexQueue, Result};
use bridge_storage::PostgresClient;
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::events::{ChangeDetectionEvent, ScraperEvent};
use crate::signature;

/// Result of a durable scraper-event handler (spec §4.1 `Accepted{job_id,event_id}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedScraperEvent {
    pub job_id: String,
    pub event_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedChangeEvent {
    pub event_id: i64,
}

pub struct WebhookRouter {
    postgres: Arc<PostgresClient>,
    queue: Arc<dyn IndexQueue>,
    autowatch: Option<Arc<dyn bridge_common::AutoWatch>>,
    webhook_secret: String,
    changedetection_secret: String,
}

impl WebhookRouter {
    pub fn new(
        postgres: Arc<PostgresClient>,
        queue: Arc<dyn IndexQueue>,
        autowatch: Option<Arc<dyn bridge_common::AutoWatch>>,
        webhook_secret: impl Into<String>,
        changedetection_secret: impl Into<String>,
    ) -> Self {
        Self {
            postgres,
            queue,
            autowatch,
            webhook_secret: webhook_secret.into(),
            changedetection_secret: changedetection_secret.into(),
        }
    }

    #[instrument(skip(self, raw_body, signature_header))]
    pub async fn receive_scraper_event(
        &self,
        raw_body: &[u8],
        signature_header: &str,
        request_id: Option<&str>,
    ) -> Result<AcceptedScraperEvent> {
        let verified = signature::verify(raw_body, signature_header, self.webhook_secret.as_bytes())?;
        let event: ScraperEvent = serde_json::from_slice(verified)
            .map_err(|e| BridgeError::bad_request(format!("malformed scraper event: {e}")))?;

        match event {
            ScraperEvent::CrawlStarted { job_id, base_url, started_at, initiated_at } => {
                self.postgres
                    .upsert_crawl_started(&job_id, base_url.as_deref(), started_at.unwrap_or_else(Utc::now), initiated_at)
                    .await?;
                Ok(AcceptedScraperEvent { job_id, event_id: None })
            }
            ScraperEvent::CrawlPage { job_id, page } => {
                let url = page.url.clone();
                let document = page.into();
                self.queue
                    .enqueue_batch(BatchJob {
                        documents: vec![document],
                        crawl_id: Some(job_id.clone()),
                        request_id: request_id.map(str::to_string),
                    })
                    .await?;
                self.spawn_autowatch(url);
                Ok(AcceptedScraperEvent { job_id, event_id: None })
            }
            ScraperEvent::CrawlCompleted { job_id } | ScraperEvent::ScrapeCompleted { job_id } => {
                self.postgres.complete_crawl(&job_id, Utc::now()).await?;
                Ok(AcceptedScraperEvent { job_id, event_id: None })
            }
            ScraperEvent::CrawlFailed { job_id, error_message } => {
                self.postgres
                    .mark_crawl_failed(&job_id, error_message.as_deref().unwrap_or("crawl failed"))
                    .await?;
                Ok(AcceptedScraperEvent { job_id, event_id: None })
            }
            ScraperEvent::BatchCompleted { job_id } => {
                info!(job_id = %job_id, "batch completed; aggregates are recomputed on crawl completion");
                Ok(AcceptedScraperEvent { job_id, event_id: None })
            }
        }
    }

    #[instrument(skip(self, raw_body, signature_header))]
    pub async fn receive_change_event(&self, raw_body: &[u8], signature_header: &str) -> Result<AcceptedChangeEvent> {
        let verified = signature::verify(raw_body, signature_header, self.changedetection_secret.as_bytes())?;
        let event: ChangeDetectionEvent = serde_json::from_slice(verified)
            .map_err(|e| BridgeError::bad_request(format!("malformed change-detection event: {e}")))?;

        let received_at = Utc::now();
        let event_id = self
            .postgres
            .insert_change_event(
                &event.url,
                event.watch_id.as_deref(),
                event.extra_metadata(signature_header, received_at),
            )
            .await?;
        Ok(AcceptedChangeEvent { event_id })
    }

    fn spawn_autowatch(&self, url: String) {
        let Some(autowatch) = self.autowatch.clone() else { return };
        tokio::spawn(async move {
            if let Err(err) = autowatch.ensure_watch(&url).await {
                warn!(url = %url, error = %err, "auto-watch mirror failed; continuing without it");
            }
        });
    }
}
