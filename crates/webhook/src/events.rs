//! Wire schema for inbound scraper and change-detection webhook events
//! (spec §4.1 routing table).

use std::collections::HashMap;

use bridge_common::types::DocumentPayload;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as Json;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ScraperEvent {
    #[serde(rename = "crawl.started")]
    CrawlStarted {
        job_id: String,
        base_url: Option<String>,
        started_at: Option<DateTime<Utc>>,
        initiated_at: Option<DateTime<Utc>>,
    },
    #[serde(rename = "crawl.page")]
    CrawlPage {
        job_id: String,
        #[serde(flatten)]
        page: ScraperPagePayload,
    },
    #[serde(rename = "crawl.completed")]
    CrawlCompleted { job_id: String },
    #[serde(rename = "scrape.completed")]
    ScrapeCompleted { job_id: String },
    #[serde(rename = "crawl.failed")]
    CrawlFailed { job_id: String, error_message: Option<String> },
    #[serde(rename = "batch.completed")]
    BatchCompleted { job_id: String },
}

/// Same shape as `/api/index`'s body (spec §6), minus the `job_id`
/// which is carried at the envelope level for `crawl.page`.
#[derive(Debug, Deserialize)]
pub struct ScraperPagePayload {
    pub url: String,
    #[serde(rename = "resolvedUrl", default)]
    pub resolved_url: Option<String>,
    pub markdown: String,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(rename = "statusCode", default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub links: HashMap<String, String>,
    #[serde(default)]
    pub metadata: Json,
    #[serde(default)]
    pub screenshot: Option<String>,
}

impl From<ScraperPagePayload> for DocumentPayload {
    fn from(page: ScraperPagePayload) -> Self {
        DocumentPayload {
            url: page.url,
            resolved_url: page.resolved_url,
            markdown: page.markdown,
            html: page.html,
            status_code: page.status_code,
            title: page.title,
            description: page.description,
            links: page.links,
            metadata: page.metadata,
            screenshot: page.screenshot,
        }
    }
}

/// Change-detection webhook body. The upstream service's exact field set is
/// out of scope (spec §1); we keep what the rescrape job and `ChangeEvent`
/// row need and fold the rest into `extra_metadata`.
#[derive(Debug, Deserialize)]
pub struct ChangeDetectionEvent {
    pub url: String,
    #[serde(default)]
    pub watch_id: Option<String>,
    #[serde(default)]
    pub watch_title: Option<String>,
    #[serde(default)]
    pub diff_size: Option<i64>,
    #[serde(default)]
    pub detected_at: Option<DateTime<Utc>>,
}

impl ChangeDetectionEvent {
    /// `signature` is the verified HMAC signature from the inbound request,
    /// kept alongside the rest of the change event (spec §3 `ChangeEvent.
    /// extra_metadata`: "signature, diff_size, watch_title, detected_at,
    /// webhook_received_at").
    pub fn extra_metadata(&self, signature: &str, webhook_received_at: DateTime<Utc>) -> Json {
        serde_json::json!({
            "signature": signature,
            "watch_title": self.watch_title,
            "diff_size": self.diff_size,
            "detected_at": self.detected_at,
            "webhook_received_at": webhook_received_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_crawl_page_with_camel_case_fields() {
        let body = serde_json::json!({
            "type": "crawl.page",
            "job_id": "J1",
            "url": "https://example.com/a",
            "resolvedUrl": "https://example.com/a",
            "markdown": "# hi",
            "statusCode": 200,
            "title": "A",
        });
        let event: ScraperEvent = serde_json::from_value(body).unwrap();
        match event {
            ScraperEvent::CrawlPage { job_id, page } => {
                assert_eq!(job_id, "J1");
                assert_eq!(page.status_code, Some(200));
                assert_eq!(page.resolved_url.as_deref(), Some("https://example.com/a"));
            }
            other => panic!("expected CrawlPage, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_event_type() {
        let body = serde_json::json!({ "type": "crawl.unknown", "job_id": "J1" });
        let result: std::result::Result<ScraperEvent, _> = serde_json::from_value(body);
        assert!(result.is_err());
    }
}
