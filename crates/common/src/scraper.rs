//! Seam between the rescrape job and the upstream scraper's single-URL
//! rescrape endpoint (spec §4.7 Phase 2, §6 "Scraper (for rescrape)").

use async_trait::async_trait;

use crate::types::DocumentPayload;
use crate::Result;

#[async_trait]
pub trait RescrapeClient: Send + Sync {
    async fn rescrape(&self, url: &str) -> Result<DocumentPayload>;
}
