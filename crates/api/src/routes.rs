//! HTTP handlers for the surface in spec §6.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use bridge_common::types::{DocumentPayload, SearchFilters, SearchMode};
use bridge_common::BridgeError;
use bridge_indexing::canonical;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json_;

use crate::error::ApiError;
use crate::state::AppState;

fn signature_header(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| BridgeError::Unauthorized("missing X-Signature header".to_string()).into())
}

pub async fn webhook_scraper(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = signature_header(&headers)?;
    let request_id = headers.get("x-request-id").and_then(|v| v.to_str().ok());
    let accepted = state.webhook_router.receive_scraper_event(&body, signature, request_id).await?;
    Ok(Json(serde_json::json!({ "job_id": accepted.job_id, "event_id": accepted.event_id })))
}

pub async fn webhook_change_detection(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = signature_header(&headers)?;
    let accepted = state.webhook_router.receive_change_event(&body, signature).await?;
    Ok(Json(serde_json::json!({ "event_id": accepted.event_id })))
}

/// Wire shape for `POST /api/index` (spec §6). `extract` is accepted only so
/// it can be rejected with a migration hint — the field was removed from
/// the indexing pipeline itself.
#[derive(Deserialize)]
pub(crate) struct IndexRequestWire {
    url: String,
    #[serde(rename = "resolvedUrl")]
    resolved_url: Option<String>,
    markdown: String,
    html: Option<String>,
    #[serde(rename = "statusCode")]
    status_code: Option<u16>,
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    links: HashMap<String, String>,
    #[serde(default)]
    metadata: Json_,
    screenshot: Option<String>,
    extract: Option<Json_>,
}

pub async fn index_document(
    State(state): State<AppState>,
    Json(body): Json<IndexRequestWire>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.index_rate_limiter.try_acquire() {
        return Err(BridgeError::ServiceUnavailable("rate limit exceeded for /api/index".to_string()).into());
    }
    if body.extract.is_some() {
        return Err(BridgeError::bad_request_with_hint(
            "the `extract` field was removed",
            "submit fully-rendered `markdown` instead of an extraction directive",
        )
        .into());
    }

    let doc = DocumentPayload {
        url: body.url,
        resolved_url: body.resolved_url,
        markdown: body.markdown,
        html: body.html,
        status_code: body.status_code,
        title: body.title,
        description: body.description,
        links: body.links,
        metadata: body.metadata,
        screenshot: body.screenshot,
    };
    let result = state.pool.pipeline.index_document(doc, None, None).await;
    if result.success {
        Ok((StatusCode::OK, Json(result)))
    } else {
        Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(result)))
    }
}

#[derive(Deserialize)]
pub struct SearchRequestWire {
    query: String,
    #[serde(default = "default_search_mode")]
    mode: SearchMode,
    #[serde(default = "default_search_limit")]
    limit: usize,
    #[serde(default)]
    filters: SearchFilters,
}

fn default_search_mode() -> SearchMode {
    SearchMode::Hybrid
}

fn default_search_limit() -> usize {
    10
}

#[derive(Serialize)]
pub struct SearchResponse {
    results: Vec<bridge_common::types::SearchResult>,
}

pub async fn search(State(state): State<AppState>, Json(body): Json<SearchRequestWire>) -> Result<impl IntoResponse, ApiError> {
    if body.query.trim().is_empty() {
        return Err(BridgeError::bad_request("query must not be empty").into());
    }
    let results = state.pool.orchestrator.search(&body.query, body.mode, body.limit, &body.filters).await?;
    Ok(Json(SearchResponse { results }))
}

#[derive(Deserialize)]
pub struct ContentByUrlQuery {
    url: String,
    #[serde(default = "default_content_limit")]
    limit: i64,
}

fn default_content_limit() -> i64 {
    10
}

pub async fn content_by_url(State(state): State<AppState>, Query(params): Query<ContentByUrlQuery>) -> Result<impl IntoResponse, ApiError> {
    let canonical_url = canonical::normalize(&params.url, state.config.tracking_param_strip);

    if let Ok(Some(cached)) = state.pool.redis.get(&canonical_url).await {
        return Ok(Json(cached));
    }

    let rows = state.pool.postgres.get_content_by_canonical_url(&canonical_url, params.limit).await?;
    if !rows.is_empty() {
        if let Err(err) = state.pool.redis.put(&canonical_url, &rows).await {
            tracing::warn!(error = %err, "failed to populate content cache");
        }
    }
    Ok(Json(rows))
}

pub async fn content_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse, ApiError> {
    if id <= 0 {
        return Err(BridgeError::bad_request("id must be a positive integer").into());
    }
    let content = state
        .pool
        .postgres
        .get_content_by_id(id)
        .await?
        .ok_or_else(|| BridgeError::NotFound(format!("content {id} not found")))?;
    Ok(Json(content))
}

#[derive(Deserialize)]
pub struct CrawlMetricsQuery {
    #[serde(default)]
    include_per_page: bool,
}

pub async fn crawl_metrics(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(params): Query<CrawlMetricsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let metrics = state.lifecycle.get_metrics(&job_id, params.include_per_page).await?;
    Ok(Json(metrics))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    dependencies: HashMap<&'static str, &'static str>,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut dependencies = HashMap::new();

    dependencies.insert("redis", if state.pool.redis.ping().await.is_ok() { "ok" } else { "down" });
    dependencies.insert("vector_store", if state.pool.qdrant.health().await.is_ok() { "ok" } else { "down" });
    dependencies.insert(
        "embedding_service",
        if state.pool.embedder.embed_one("healthcheck").await.is_ok() { "ok" } else { "down" },
    );

    let status = if dependencies.values().all(|v| *v == "ok") { "ok" } else { "degraded" };
    Json(HealthResponse { status, dependencies })
}
