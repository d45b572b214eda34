//! Read-through content cache (spec §4.6): `content:by-url:<canonical_url>`
//! keyed JSON blobs with a configurable TTL, invalidated on write.

use bridge_common::types::ScrapedContent;
use bridge_common::{BridgeError, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

pub struct RedisCache {
    manager: ConnectionManager,
    ttl_seconds: u64,
}

fn cache_key(canonical_url: &str) -> String {
    format!("content:by-url:{canonical_url}")
}

impl RedisCache {
    pub async fn new(redis_url: &str, ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| BridgeError::ServiceUnavailable(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(e.to_string()))?;
        Ok(Self { manager, ttl_seconds })
    }

    /// Returns the cached rows for a canonical URL, or `None` on a cache
    /// miss. Callers fall through to Postgres and call [`Self::put`] on a
    /// miss so the cache stays warm without blocking the response path on
    /// Redis write latency — the write happens before the response returns,
    /// matching the read-through contract in spec §4.6.
    pub async fn get(&self, canonical_url: &str) -> Result<Option<Vec<ScrapedContent>>> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn
            .get(cache_key(canonical_url))
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(e.to_string()))?;
        match raw {
            Some(json) => {
                let rows = serde_json::from_str(&json)
                    .map_err(|e| BridgeError::Internal(format!("corrupt cache entry: {e}")))?;
                Ok(Some(rows))
            }
            None => Ok(None),
        }
    }

    pub async fn put(&self, canonical_url: &str, rows: &[ScrapedContent]) -> Result<()> {
        let mut conn = self.manager.clone();
        let json = serde_json::to_string(rows)
            .map_err(|e| BridgeError::Internal(format!("failed to serialize cache entry: {e}")))?;
        conn.set_ex::<_, _, ()>(cache_key(canonical_url), json, self.ttl_seconds)
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Invalidated whenever new content lands for this URL so a stale cache
    /// entry never outlives a rescrape (spec §4.6, §4.7).
    pub async fn invalidate(&self, canonical_url: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(cache_key(canonical_url))
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Used by `GET /health` (spec §6) to report redis as one of the
    /// dependency subsets.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(e.to_string()))?;
        Ok(())
    }
}
