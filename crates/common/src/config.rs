//! Configuration surface (spec §6) — one struct, explicit defaults, explicit validators.
//!
//! Unlike the TOML-only config the indexing-pipeline lineage this crate draws
//! from used, this surface is environment-variable first: every key in
//! spec §6's table is read from the process environment with a documented
//! default, then validated once at startup.

use crate::error::{BridgeError, Result};

const MIN_SECRET_LEN: usize = 16;
const PLACEHOLDER_SECRETS: &[&str] = &[
    "changeme",
    "change-me",
    "secret",
    "test",
    "dev",
    "development",
    "password",
];

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Fan-out width for the batch indexing worker (1-32, spec §4.2).
    pub worker_batch_size: usize,
    pub db_pool_size: u32,
    pub db_max_overflow: u32,
    pub database_url: String,
    pub redis_url: String,
    pub vector_url: String,
    pub embed_url: String,
    pub change_detection_url: Option<String>,
    /// Upstream single-URL rescrape endpoint (spec §6: "the rescrape job
    /// calls whatever single-URL endpoint is configured"). Not one of
    /// spec §6's enumerated "essential keys", but required for the
    /// rescrape job to have anything to call.
    pub scraper_url: Option<String>,
    /// This service's own externally-reachable base URL, used to build the
    /// webhook target handed to the change-detection service when creating
    /// an auto-watch (spec §4.7: "webhook target = this service's
    /// change-event endpoint"). Not one of spec §6's enumerated keys.
    pub public_base_url: Option<String>,
    pub api_secret: String,
    pub webhook_secret: String,
    pub changedetection_hmac_secret: String,
    pub enable_auto_watch: bool,
    pub check_interval_seconds: u64,
    pub content_cache_ttl_seconds: u64,
    pub rrf_k: f64,
    pub tracking_param_strip: bool,
    pub cors_origins: Vec<String>,
}

impl BridgeConfig {
    /// Load from the process environment, applying defaults and validators.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            worker_batch_size: env_parse("WORKER_BATCH_SIZE", 4)?,
            db_pool_size: env_parse("DB_POOL_SIZE", 40)?,
            db_max_overflow: env_parse("DB_MAX_OVERFLOW", 20)?,
            database_url: env_string(
                "DATABASE_URL",
                "postgres://localhost/bridge",
            ),
            redis_url: env_string("REDIS_URL", "redis://localhost:6379"),
            vector_url: env_string("VECTOR_URL", "http://localhost:6334"),
            embed_url: env_string("EMBED_URL", "http://localhost:8081"),
            change_detection_url: std::env::var("CHANGE_DETECTION_URL").ok(),
            scraper_url: std::env::var("SCRAPER_URL").ok(),
            public_base_url: std::env::var("PUBLIC_BASE_URL").ok(),
            api_secret: env_string("API_SECRET", "changeme-api-secret-placeholder"),
            webhook_secret: env_string("WEBHOOK_SECRET", "changeme-webhook-secret-placeholder"),
            changedetection_hmac_secret: env_string(
                "CHANGEDETECTION_HMAC_SECRET",
                "changeme-cd-secret-placeholder",
            ),
            enable_auto_watch: env_parse("ENABLE_AUTO_WATCH", true)?,
            check_interval_seconds: env_parse("CHECK_INTERVAL_SECONDS", 3600)?,
            content_cache_ttl_seconds: env_parse("CONTENT_CACHE_TTL_SECONDS", 3600)?,
            rrf_k: env_parse("RRF_K", 60.0)?,
            tracking_param_strip: env_parse("TRACKING_PARAM_STRIP", true)?,
            cors_origins: env_json_array("CORS_ORIGINS")?,
        };
        config.validate_secrets(cfg!(not(debug_assertions)))?;
        Ok(config)
    }

    /// Reject secrets matching known dev-only placeholders or below the
    /// minimum length threshold. `strict` additionally forbids a missing
    /// `CHANGE_DETECTION_URL` paired with `enable_auto_watch = true`.
    pub fn validate_secrets(&self, strict: bool) -> Result<()> {
        for (name, value) in [
            ("API_SECRET", &self.api_secret),
            ("WEBHOOK_SECRET", &self.webhook_secret),
            ("CHANGEDETECTION_HMAC_SECRET", &self.changedetection_hmac_secret),
        ] {
            if value.len() < MIN_SECRET_LEN {
                return Err(BridgeError::bad_request_with_hint(
                    format!("{name} is shorter than the minimum of {MIN_SECRET_LEN} characters"),
                    format!("set {name} to a long, random value before starting in production"),
                ));
            }
            let lowered = value.to_ascii_lowercase();
            if PLACEHOLDER_SECRETS.iter().any(|p| lowered.contains(p)) {
                return Err(BridgeError::bad_request_with_hint(
                    format!("{name} looks like a development placeholder"),
                    format!("set {name} to a real secret before starting in production"),
                ));
            }
        }
        if strict && self.enable_auto_watch && self.change_detection_url.is_none() {
            return Err(BridgeError::bad_request(
                "ENABLE_AUTO_WATCH is set but CHANGE_DETECTION_URL is not configured",
            ));
        }
        if strict && self.enable_auto_watch && self.public_base_url.is_none() {
            return Err(BridgeError::bad_request(
                "ENABLE_AUTO_WATCH is set but PUBLIC_BASE_URL is not configured",
            ));
        }
        if !(1..=32).contains(&self.worker_batch_size) {
            return Err(BridgeError::bad_request(
                "WORKER_BATCH_SIZE must be between 1 and 32",
            ));
        }
        Ok(())
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|_| {
            BridgeError::bad_request(format!("{key} is set but could not be parsed"))
        }),
        Err(_) => Ok(default),
    }
}

/// Parse a JSON array of strings; reject anything malformed rather than
/// silently coercing (spec §9: "do not silently coerce").
fn env_json_array(key: &str) -> Result<Vec<String>> {
    match std::env::var(key) {
        Ok(raw) => serde_json::from_str::<Vec<String>>(&raw).map_err(|e| {
            BridgeError::bad_request(format!("{key} must be a JSON array of strings: {e}"))
        }),
        Err(_) => Ok(vec!["*".to_string()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_secret() {
        let mut cfg = default_test_config();
        cfg.api_secret = "short".to_string();
        assert!(cfg.validate_secrets(false).is_err());
    }

    #[test]
    fn rejects_placeholder_secret() {
        let mut cfg = default_test_config();
        cfg.webhook_secret = "this-is-a-changeme-secret".to_string();
        assert!(cfg.validate_secrets(false).is_err());
    }

    #[test]
    fn accepts_strong_secrets() {
        let cfg = default_test_config();
        assert!(cfg.validate_secrets(false).is_ok());
    }

    #[test]
    fn rejects_out_of_range_batch_size() {
        let mut cfg = default_test_config();
        cfg.worker_batch_size = 64;
        assert!(cfg.validate_secrets(false).is_err());
    }

    fn default_test_config() -> BridgeConfig {
        BridgeConfig {
            worker_batch_size: 4,
            db_pool_size: 40,
            db_max_overflow: 20,
            database_url: "postgres://localhost/bridge_test".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
            vector_url: "http://localhost:6334".to_string(),
            embed_url: "http://localhost:8081".to_string(),
            change_detection_url: None,
            scraper_url: None,
            public_base_url: None,
            api_secret: "a-sufficiently-long-random-secret".to_string(),
            webhook_secret: "another-sufficiently-long-secret".to_string(),
            changedetection_hmac_secret: "yet-another-long-enough-secret".to_string(),
            enable_auto_watch: false,
            check_interval_seconds: 3600,
            content_cache_ttl_seconds: 3600,
            rrf_k: 60.0,
            tracking_param_strip: true,
            cors_origins: vec!["https://example.com".to_string()],
        }
    }
}
