//! Shared domain types for the indexing bridge (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::HashMap;

/// `CrawlSession.status` — monotonic state machine (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl CrawlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for CrawlStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown crawl status: {other}")),
        }
    }
}

/// One logical scrape/crawl session, keyed by the upstream `job_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSession {
    pub job_id: String,
    pub base_url: Option<String>,
    pub status: CrawlStatus,
    pub success: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub initiated_at: Option<DateTime<Utc>>,
    pub total_pages: i64,
    pub pages_indexed: i64,
    pub pages_failed: i64,
    pub total_chunking_ms: i64,
    pub total_embedding_ms: i64,
    pub total_vector_ms: i64,
    pub total_bm25_ms: i64,
    pub duration_ms: Option<i64>,
    pub e2e_duration_ms: Option<i64>,
    pub extra_metadata: Json,
    pub error_message: Option<String>,
}

/// One timed pipeline/request step (spec §3 `OperationMetric`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetric {
    pub id: i64,
    pub operation_type: String,
    pub operation_name: String,
    pub duration_ms: i64,
    pub success: bool,
    pub request_id: Option<String>,
    pub crawl_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub extra_metadata: Json,
}

/// Stable operation-type tags emitted by the indexing pipeline (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Chunking,
    Embedding,
    Qdrant,
    Bm25,
    Batch,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chunking => "chunking",
            Self::Embedding => "embedding",
            Self::Qdrant => "qdrant",
            Self::Bm25 => "bm25",
            Self::Batch => "batch",
        }
    }
}

/// Durable scraped document (spec §3 `ScrapedContent`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedContent {
    pub id: i64,
    pub crawl_session_id: String,
    pub url: String,
    pub canonical_url: String,
    pub source_url: Option<String>,
    pub content_source: String,
    pub markdown: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub links: Json,
    pub extra_metadata: Json,
    pub screenshot_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// `rescrape_status` — monotonic forward transitions only (spec §3 `ChangeEvent`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescrapeStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl RescrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for RescrapeStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown rescrape status: {other}")),
        }
    }
}

/// An inbound change-detection notification awaiting rescrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: i64,
    pub url: String,
    pub watch_id: Option<String>,
    pub received_at: DateTime<Utc>,
    pub rescrape_status: RescrapeStatus,
    pub rescrape_started_at: Option<DateTime<Utc>>,
    pub rescrape_completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub extra_metadata: Json,
}

/// One scraped document handed to the indexing pipeline (spec §4.3 input).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub url: String,
    pub resolved_url: Option<String>,
    pub markdown: String,
    pub html: Option<String>,
    pub status_code: Option<u16>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub links: HashMap<String, String>,
    #[serde(default)]
    pub metadata: Json,
    pub screenshot: Option<String>,
}

/// Outcome of indexing one document (spec §4.2/§4.3 per-document result).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    pub success: bool,
    pub url: String,
    pub error: Option<String>,
    pub error_type: Option<String>,
}

/// Payload written alongside each vector (spec §3 `DocumentChunk`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunkPayload {
    pub url: String,
    pub canonical_url: String,
    pub title: Option<String>,
    pub text: String,
    pub chunk_index: usize,
    pub crawl_session_id: Option<String>,
    pub indexed_at: DateTime<Utc>,
}

/// Hybrid search mode (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Vector,
    Bm25,
    Hybrid,
}

/// Backend that produced (or fused) a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Vector,
    Bm25,
    Hybrid,
}

/// Optional constraints applied uniformly to both search backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub canonical_url: Option<String>,
    pub host: Option<String>,
    pub crawl_session_id: Option<String>,
}

/// One fused/unfused search result row (spec §4.4 output fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub url: String,
    pub canonical_url: String,
    pub title: Option<String>,
    pub text: String,
    pub score: f64,
    pub source: ResultSource,
    pub chunk_index: Option<usize>,
}

/// A ranked hit as returned by a single backend, prior to fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendHit {
    pub id: String,
    pub url: String,
    pub canonical_url: Option<String>,
    pub title: Option<String>,
    pub text: String,
    pub score: f64,
    pub chunk_index: Option<usize>,
}
