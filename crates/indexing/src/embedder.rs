//! HTTP client for the external embedding service (spec §6: `POST {inputs}` →
//! `{embeddings}`).

use std::time::Duration;

use async_trait::async_trait;
use bridge_common::{BridgeError, Embedder, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct EmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl EmbeddingClient {
    pub fn new(embed_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| BridgeError::Internal(e.to_string()))?;
        Ok(Self { client, endpoint: embed_url.into() })
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest { inputs: texts })
            .send()
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(format!("embedding request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(BridgeError::ServiceUnavailable(format!(
                "embedding service returned {}",
                response.status()
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(format!("malformed embedding response: {e}")))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(BridgeError::ServiceUnavailable(format!(
                "embedding service returned {} vectors for {} inputs",
                parsed.embeddings.len(),
                texts.len()
            )));
        }
        Ok(parsed.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn embeds_a_batch_of_texts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.1, 0.2], [0.3, 0.4]]
            })))
            .mount(&server)
            .await;

        let client = EmbeddingClient::new(format!("{}/embed", server.uri())).unwrap();
        let result = client
            .embed_batch(&["hello".to_string(), "world".to_string()])
            .await
            .unwrap();

        assert_eq!(result, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn rejects_dimension_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.1, 0.2]]
            })))
            .mount(&server)
            .await;

        let client = EmbeddingClient::new(format!("{}/embed", server.uri())).unwrap();
        let result = client.embed_batch(&["one".to_string(), "two".to_string()]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn surfaces_service_errors_as_service_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = EmbeddingClient::new(format!("{}/embed", server.uri())).unwrap();
        let err = client.embed_batch(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, BridgeError::ServiceUnavailable(_)));
    }
}
