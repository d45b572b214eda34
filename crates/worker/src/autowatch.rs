//! Best-effort mirror of newly indexed URLs into the change-detection
//! service (spec §4.7). Idempotent: looks up an existing watch before
//! creating one, and treats HTTP 409 as success.

use async_trait::async_trait;
use bridge_common::{AutoWatch, BridgeError, Result};
use serde::Serialize;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const AUTOWATCH_TAG: &str = "autowatch";

pub struct AutoWatchClient {
    client: reqwest::Client,
    base_url: String,
    webhook_target: String,
    check_interval_seconds: u64,
}

#[derive(Serialize)]
struct CreateWatchRequest<'a> {
    url: &'a str,
    tag: &'a str,
    webhook_url: &'a str,
    check_interval_seconds: u64,
}

impl AutoWatchClient {
    pub fn new(base_url: impl Into<String>, webhook_target: impl Into<String>, check_interval_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| BridgeError::Internal(e.to_string()))?;
        Ok(Self { client, base_url: base_url.into(), webhook_target: webhook_target.into(), check_interval_seconds })
    }

    async fn find_existing(&self, url: &str) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/v1/watch", self.base_url))
            .query(&[("url", url)])
            .send()
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(format!("change-detection lookup failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(BridgeError::ServiceUnavailable(format!(
                "change-detection lookup returned {}",
                response.status()
            )));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(format!("malformed change-detection lookup response: {e}")))?;
        Ok(body
            .as_array()
            .map(|watches| !watches.is_empty())
            .unwrap_or_else(|| !body.is_null()))
    }
}

#[async_trait]
impl AutoWatch for AutoWatchClient {
    async fn ensure_watch(&self, url: &str) -> Result<()> {
        if self.find_existing(url).await? {
            return Ok(());
        }

        let response = self
            .client
            .post(format!("{}/api/v1/watch", self.base_url))
            .json(&CreateWatchRequest {
                url,
                tag: AUTOWATCH_TAG,
                webhook_url: &self.webhook_target,
                check_interval_seconds: self.check_interval_seconds,
            })
            .send()
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(format!("change-detection create-watch failed: {e}")))?;

        if response.status().is_success() || response.status() == reqwest::StatusCode::CONFLICT {
            return Ok(());
        }
        Err(BridgeError::ServiceUnavailable(format!(
            "change-detection create-watch returned {}",
            response.status()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn skips_creation_when_watch_already_exists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": "w1"}])))
            .mount(&server)
            .await;

        let client = AutoWatchClient::new(server.uri(), "https://bridge.example.com/api/webhook/change-detection", 3600).unwrap();
        client.ensure_watch("https://example.com/a").await.unwrap();
    }

    #[tokio::test]
    async fn treats_conflict_on_create_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/watch"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/watch"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let client = AutoWatchClient::new(server.uri(), "https://bridge.example.com/api/webhook/change-detection", 3600).unwrap();
        client.ensure_watch("https://example.com/a").await.unwrap();
    }

    #[tokio::test]
    async fn creates_when_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/watch"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/watch"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = AutoWatchClient::new(server.uri(), "https://bridge.example.com/api/webhook/change-detection", 3600).unwrap();
        client.ensure_watch("https://example.com/a").await.unwrap();
    }
}
