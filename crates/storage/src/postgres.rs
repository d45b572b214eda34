//! Durable relational store: crawl sessions, operation metrics, scraped
//! content and change events (spec §3, §4.5, §4.6, §4.7).

use bridge_common::types::{
    ChangeEvent, CrawlSession, CrawlStatus, OperationMetric, RescrapeStatus, ScrapedContent,
};
use bridge_common::{BridgeError, Result};
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Row};
use std::str::FromStr;

#[derive(Clone)]
pub struct PostgresClient {
    pool: PgPool,
}

#[derive(FromRow)]
struct CrawlSessionRow {
    job_id: String,
    base_url: Option<String>,
    status: String,
    success: Option<bool>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    initiated_at: Option<DateTime<Utc>>,
    total_pages: i64,
    pages_indexed: i64,
    pages_failed: i64,
    total_chunking_ms: i64,
    total_embedding_ms: i64,
    total_vector_ms: i64,
    total_bm25_ms: i64,
    duration_ms: Option<i64>,
    e2e_duration_ms: Option<i64>,
    extra_metadata: Json,
    error_message: Option<String>,
}

impl TryFrom<CrawlSessionRow> for CrawlSession {
    type Error = BridgeError;

    fn try_from(row: CrawlSessionRow) -> Result<Self> {
        Ok(CrawlSession {
            job_id: row.job_id,
            base_url: row.base_url,
            status: CrawlStatus::from_str(&row.status).map_err(BridgeError::Internal)?,
            success: row.success,
            started_at: row.started_at,
            completed_at: row.completed_at,
            initiated_at: row.initiated_at,
            total_pages: row.total_pages,
            pages_indexed: row.pages_indexed,
            pages_failed: row.pages_failed,
            total_chunking_ms: row.total_chunking_ms,
            total_embedding_ms: row.total_embedding_ms,
            total_vector_ms: row.total_vector_ms,
            total_bm25_ms: row.total_bm25_ms,
            duration_ms: row.duration_ms,
            e2e_duration_ms: row.e2e_duration_ms,
            extra_metadata: row.extra_metadata,
            error_message: row.error_message,
        })
    }
}

#[derive(FromRow)]
struct ScrapedContentRow {
    id: i64,
    crawl_session_id: String,
    url: String,
    canonical_url: String,
    source_url: Option<String>,
    content_source: String,
    markdown: String,
    title: Option<String>,
    description: Option<String>,
    links: Json,
    extra_metadata: Json,
    screenshot_ref: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ScrapedContentRow> for ScrapedContent {
    fn from(row: ScrapedContentRow) -> Self {
        ScrapedContent {
            id: row.id,
            crawl_session_id: row.crawl_session_id,
            url: row.url,
            canonical_url: row.canonical_url,
            source_url: row.source_url,
            content_source: row.content_source,
            markdown: row.markdown,
            title: row.title,
            description: row.description,
            links: row.links,
            extra_metadata: row.extra_metadata,
            screenshot_ref: row.screenshot_ref,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ChangeEventRow {
    id: i64,
    url: String,
    watch_id: Option<String>,
    received_at: DateTime<Utc>,
    rescrape_status: String,
    rescrape_started_at: Option<DateTime<Utc>>,
    rescrape_completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    extra_metadata: Json,
}

impl TryFrom<ChangeEventRow> for ChangeEvent {
    type Error = BridgeError;

    fn try_from(row: ChangeEventRow) -> Result<Self> {
        Ok(ChangeEvent {
            id: row.id,
            url: row.url,
            watch_id: row.watch_id,
            received_at: row.received_at,
            rescrape_status: RescrapeStatus::from_str(&row.rescrape_status)
                .map_err(BridgeError::Internal)?,
            rescrape_started_at: row.rescrape_started_at,
            rescrape_completed_at: row.rescrape_completed_at,
            error_message: row.error_message,
            extra_metadata: row.extra_metadata,
        })
    }
}

/// Aggregates computed from `operation_metrics` for one crawl (spec §4.5 step 1-3).
#[derive(Debug, Default)]
pub struct CrawlAggregates {
    pub total_pages: i64,
    pub pages_indexed: i64,
    pub pages_failed: i64,
    pub total_chunking_ms: i64,
    pub total_embedding_ms: i64,
    pub total_vector_ms: i64,
    pub total_bm25_ms: i64,
}

impl PostgresClient {
    pub async fn new(database_url: &str, pool_size: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(database_url)
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| BridgeError::Internal(e.to_string()))
    }

    /// `crawl.started` — idempotent by `job_id` (spec §4.1, §4.5).
    pub async fn upsert_crawl_started(
        &self,
        job_id: &str,
        base_url: Option<&str>,
        started_at: DateTime<Utc>,
        initiated_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO crawl_sessions (job_id, base_url, status, started_at, initiated_at)
            VALUES ($1, $2, 'in_progress', $3, $4)
            ON CONFLICT (job_id) DO NOTHING
            "#,
        )
        .bind(job_id)
        .bind(base_url)
        .bind(started_at)
        .bind(initiated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn get_crawl_session(&self, job_id: &str) -> Result<Option<CrawlSession>> {
        let row =
            sqlx::query_as::<_, CrawlSessionRow>("SELECT * FROM crawl_sessions WHERE job_id = $1")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| BridgeError::Internal(e.to_string()))?;
        row.map(CrawlSession::try_from).transpose()
    }

    pub async fn mark_crawl_failed(&self, job_id: &str, error_message: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE crawl_sessions
            SET status = 'failed', success = false, error_message = $2
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;
        Ok(())
    }

    /// `crawl.completed`/`scrape.completed` aggregation (spec §4.5).
    ///
    /// Runs the aggregate queries and the session update inside one
    /// transaction so a crash mid-aggregation never leaves the session row
    /// half updated.
    pub async fn complete_crawl(
        &self,
        job_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<CrawlSession> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BridgeError::Internal(e.to_string()))?;

        let totals_row = sqlx::query(
            r#"
            SELECT
                COUNT(DISTINCT document_url) FILTER (
                    WHERE operation_type IN ('chunking', 'embedding', 'qdrant', 'bm25')
                ) AS total_pages,
                COUNT(DISTINCT document_url) FILTER (
                    WHERE success AND operation_type IN ('chunking', 'embedding', 'qdrant', 'bm25')
                ) AS pages_indexed
            FROM operation_metrics
            WHERE crawl_id = $1
            "#,
        )
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;

        let total_pages: i64 = totals_row
            .try_get::<Option<i64>, _>("total_pages")
            .map_err(|e| BridgeError::Internal(e.to_string()))?
            .unwrap_or(0);
        let pages_indexed: i64 = totals_row
            .try_get::<Option<i64>, _>("pages_indexed")
            .map_err(|e| BridgeError::Internal(e.to_string()))?
            .unwrap_or(0);
        let pages_failed = total_pages - pages_indexed;

        let duration_rows = sqlx::query(
            r#"
            SELECT operation_type, COALESCE(SUM(duration_ms), 0) AS total_ms
            FROM operation_metrics
            WHERE crawl_id = $1
            GROUP BY operation_type
            "#,
        )
        .bind(job_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;

        let mut aggregates = CrawlAggregates {
            total_pages,
            pages_indexed,
            pages_failed,
            ..Default::default()
        };
        for row in duration_rows {
            let op_type: String = row
                .try_get("operation_type")
                .map_err(|e| BridgeError::Internal(e.to_string()))?;
            let total_ms: i64 = row
                .try_get("total_ms")
                .map_err(|e| BridgeError::Internal(e.to_string()))?;
            match op_type.as_str() {
                "chunking" => aggregates.total_chunking_ms = total_ms,
                "embedding" => aggregates.total_embedding_ms = total_ms,
                "qdrant" => aggregates.total_vector_ms = total_ms,
                "bm25" => aggregates.total_bm25_ms = total_ms,
                _ => {}
            }
        }

        let existing = sqlx::query_as::<_, CrawlSessionRow>(
            "SELECT * FROM crawl_sessions WHERE job_id = $1 FOR UPDATE",
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?
        .ok_or_else(|| BridgeError::NotFound(format!("crawl session {job_id} not found")))?;

        let duration_ms = (completed_at - existing.started_at).num_milliseconds().max(0);
        let e2e_duration_ms = existing
            .initiated_at
            .map(|t| (completed_at - t).num_milliseconds().max(0));

        let updated = sqlx::query_as::<_, CrawlSessionRow>(
            r#"
            UPDATE crawl_sessions
            SET status = 'completed',
                success = true,
                completed_at = $2,
                total_pages = $3,
                pages_indexed = $4,
                pages_failed = $5,
                total_chunking_ms = $6,
                total_embedding_ms = $7,
                total_vector_ms = $8,
                total_bm25_ms = $9,
                duration_ms = $10,
                e2e_duration_ms = $11
            WHERE job_id = $1
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(completed_at)
        .bind(aggregates.total_pages)
        .bind(aggregates.pages_indexed)
        .bind(aggregates.pages_failed)
        .bind(aggregates.total_chunking_ms)
        .bind(aggregates.total_embedding_ms)
        .bind(aggregates.total_vector_ms)
        .bind(aggregates.total_bm25_ms)
        .bind(duration_ms)
        .bind(e2e_duration_ms)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;

        tx.commit().await.map_err(|e| BridgeError::Internal(e.to_string()))?;
        CrawlSession::try_from(updated)
    }

    /// Records one timed operation. Fire-and-forget at call sites — a
    /// failure here must never fail the enclosing pipeline step (spec §4.3).
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_operation_metric(
        &self,
        operation_type: &str,
        operation_name: &str,
        duration_ms: i64,
        success: bool,
        request_id: Option<&str>,
        crawl_id: Option<&str>,
        document_url: Option<&str>,
        extra_metadata: Json,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO operation_metrics
                (operation_type, operation_name, duration_ms, success, request_id, crawl_id, document_url, extra_metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(operation_type)
        .bind(operation_name)
        .bind(duration_ms)
        .bind(success)
        .bind(request_id)
        .bind(crawl_id)
        .bind(document_url)
        .bind(extra_metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;
        row.try_get("id").map_err(|e| BridgeError::Internal(e.to_string()))
    }

    pub async fn list_operation_metrics_for_crawl(
        &self,
        crawl_id: &str,
    ) -> Result<Vec<OperationMetric>> {
        let rows = sqlx::query(
            r#"
            SELECT id, operation_type, operation_name, duration_ms, success, request_id,
                   crawl_id, started_at, extra_metadata
            FROM operation_metrics
            WHERE crawl_id = $1
            ORDER BY started_at ASC
            "#,
        )
        .bind(crawl_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                Ok(OperationMetric {
                    id: row.try_get("id").map_err(|e| BridgeError::Internal(e.to_string()))?,
                    operation_type: row
                        .try_get("operation_type")
                        .map_err(|e| BridgeError::Internal(e.to_string()))?,
                    operation_name: row
                        .try_get("operation_name")
                        .map_err(|e| BridgeError::Internal(e.to_string()))?,
                    duration_ms: row
                        .try_get("duration_ms")
                        .map_err(|e| BridgeError::Internal(e.to_string()))?,
                    success: row.try_get("success").map_err(|e| BridgeError::Internal(e.to_string()))?,
                    request_id: row
                        .try_get("request_id")
                        .map_err(|e| BridgeError::Internal(e.to_string()))?,
                    crawl_id: row.try_get("crawl_id").map_err(|e| BridgeError::Internal(e.to_string()))?,
                    started_at: row
                        .try_get("started_at")
                        .map_err(|e| BridgeError::Internal(e.to_string()))?,
                    extra_metadata: row
                        .try_get("extra_metadata")
                        .map_err(|e| BridgeError::Internal(e.to_string()))?,
                })
            })
            .collect()
    }

    /// Insert-or-replace on `(url, crawl_session_id)` (spec §3 `ScrapedContent` invariant).
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_scraped_content(
        &self,
        crawl_session_id: &str,
        url: &str,
        canonical_url: &str,
        source_url: Option<&str>,
        content_source: &str,
        markdown: &str,
        title: Option<&str>,
        description: Option<&str>,
        links: Json,
        extra_metadata: Json,
        screenshot_ref: Option<&str>,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO scraped_content
                (crawl_session_id, url, canonical_url, source_url, content_source, markdown,
                 title, description, links, extra_metadata, screenshot_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (url, crawl_session_id) DO UPDATE SET
                canonical_url = EXCLUDED.canonical_url,
                source_url = EXCLUDED.source_url,
                content_source = EXCLUDED.content_source,
                markdown = EXCLUDED.markdown,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                links = EXCLUDED.links,
                extra_metadata = EXCLUDED.extra_metadata,
                screenshot_ref = EXCLUDED.screenshot_ref,
                created_at = now()
            RETURNING id
            "#,
        )
        .bind(crawl_session_id)
        .bind(url)
        .bind(canonical_url)
        .bind(source_url)
        .bind(content_source)
        .bind(markdown)
        .bind(title)
        .bind(description)
        .bind(links)
        .bind(extra_metadata)
        .bind(screenshot_ref)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;
        row.try_get("id").map_err(|e| BridgeError::Internal(e.to_string()))
    }

    pub async fn get_content_by_canonical_url(
        &self,
        canonical_url: &str,
        limit: i64,
    ) -> Result<Vec<ScrapedContent>> {
        let rows = sqlx::query_as::<_, ScrapedContentRow>(
            r#"
            SELECT * FROM scraped_content
            WHERE canonical_url = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(canonical_url)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;
        Ok(rows.into_iter().map(ScrapedContent::from).collect())
    }

    pub async fn get_content_by_id(&self, id: i64) -> Result<Option<ScrapedContent>> {
        let row = sqlx::query_as::<_, ScrapedContentRow>("SELECT * FROM scraped_content WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::Internal(e.to_string()))?;
        Ok(row.map(ScrapedContent::from))
    }

    pub async fn insert_change_event(
        &self,
        url: &str,
        watch_id: Option<&str>,
        extra_metadata: Json,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO change_events (url, watch_id, extra_metadata)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(url)
        .bind(watch_id)
        .bind(extra_metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;
        row.try_get("id").map_err(|e| BridgeError::Internal(e.to_string()))
    }

    pub async fn get_change_event(&self, id: i64) -> Result<Option<ChangeEvent>> {
        let row = sqlx::query_as::<_, ChangeEventRow>("SELECT * FROM change_events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::Internal(e.to_string()))?;
        row.map(ChangeEvent::try_from).transpose()
    }

    /// Phase-1 conditional claim (spec §4.7): at-most-one-claim semantics
    /// without holding a row lock across the long rescrape call. Returns
    /// `true` iff this caller claimed the event.
    pub async fn claim_rescrape(&self, id: i64, claimed_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE change_events
            SET rescrape_status = 'in_progress', rescrape_started_at = $2
            WHERE id = $1 AND rescrape_status = 'queued'
            "#,
        )
        .bind(id)
        .bind(claimed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn complete_rescrape(&self, id: i64, completed_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE change_events
            SET rescrape_status = 'completed', rescrape_completed_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn fail_rescrape(&self, id: i64, error_message: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE change_events
            SET rescrape_status = 'failed', error_message = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;
        Ok(())
    }

    /// Candidates for the rescrape job's poll loop (spec §4.7 Phase 1).
    pub async fn list_queued_change_events(&self, limit: i64) -> Result<Vec<ChangeEvent>> {
        let rows = sqlx::query_as::<_, ChangeEventRow>(
            r#"
            SELECT * FROM change_events
            WHERE rescrape_status = 'queued'
            ORDER BY received_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;
        rows.into_iter().map(ChangeEvent::try_from).collect()
    }

    /// Zombie sweep (spec §4.7): mark events stuck `in_progress` longer than
    /// `threshold` as `failed`. Returns the number of events cleared.
    pub async fn sweep_zombie_rescrapes(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE change_events
            SET rescrape_status = 'failed', error_message = 'abandoned: rescrape exceeded timeout'
            WHERE rescrape_status = 'in_progress' AND rescrape_started_at < $1
            "#,
        )
        .bind(older_than)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
