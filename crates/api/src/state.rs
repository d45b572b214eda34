//! Everything an axum handler needs, cheaply `Clone`-able per request.

use std::sync::Arc;

use bridge_common::BridgeConfig;
use bridge_webhook::WebhookRouter;
use bridge_worker::{LifecycleTracker, ServicePool};

use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<ServicePool>,
    pub webhook_router: Arc<WebhookRouter>,
    pub lifecycle: Arc<LifecycleTracker>,
    pub config: Arc<BridgeConfig>,
    pub api_secret: Arc<String>,
    pub index_rate_limiter: Arc<RateLimiter>,
}
