//! Process entrypoint: builds the service pool, starts the background
//! workers, and serves the HTTP API (spec §5).

use std::sync::Arc;
use std::time::Duration;

use bridge_api::{build_state, router};
use bridge_common::{BridgeConfig, RescrapeClient};
use bridge_storage::PostgresClient;
use bridge_webhook::WebhookRouter;
use bridge_worker::{AutoWatchClient, HttpRescrapeClient, LifecycleTracker, RescrapeJob, ServicePool};
use tokio::sync::watch;
use tracing::{info, warn};

const RESCRAPE_POLL_INTERVAL: Duration = Duration::from_secs(30);
const RESCRAPE_BATCH_LIMIT: i64 = 20;
const ZOMBIE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bridge_common::logging::init_tracing();
    let config = Arc::new(BridgeConfig::from_env()?);

    let (pool, queue_rx) = ServicePool::new(&config).await?;
    let postgres: Arc<PostgresClient> = pool.postgres.clone();
    let lifecycle = Arc::new(LifecycleTracker::new(postgres.clone()));

    let autowatch = build_autowatch(&config)?;
    let webhook_router = Arc::new(WebhookRouter::new(
        postgres.clone(),
        pool.clone(),
        autowatch,
        config.webhook_secret.clone(),
        config.changedetection_hmac_secret.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(bridge_worker::batch::run(pool.clone(), queue_rx, shutdown_rx.clone()));

    if let Some(client) = build_rescrape_client(&config)? {
        let job = Arc::new(RescrapeJob::new(postgres.clone(), pool.pipeline.clone(), pool.redis.clone(), client));
        tokio::spawn(bridge_worker::rescrape::poll_loop(
            job,
            RESCRAPE_POLL_INTERVAL,
            RESCRAPE_BATCH_LIMIT,
            shutdown_rx.clone(),
        ));
    } else {
        warn!("SCRAPER_URL not configured; rescrape job disabled");
    }

    tokio::spawn(zombie_sweep_loop(postgres.clone(), shutdown_rx.clone()));

    let state = build_state(pool, webhook_router, lifecycle, config.clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    info!("listening on 0.0.0.0:8080");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_tx))
        .await?;
    Ok(())
}

fn build_autowatch(config: &BridgeConfig) -> anyhow::Result<Option<Arc<dyn bridge_common::AutoWatch>>> {
    if !config.enable_auto_watch {
        return Ok(None);
    }
    let (Some(base_url), Some(public_base_url)) = (&config.change_detection_url, &config.public_base_url) else {
        warn!("ENABLE_AUTO_WATCH is set but CHANGE_DETECTION_URL/PUBLIC_BASE_URL are missing; disabling");
        return Ok(None);
    };
    let webhook_target = format!("{public_base_url}/api/webhook/change-detection");
    let client = AutoWatchClient::new(base_url.clone(), webhook_target, config.check_interval_seconds)?;
    Ok(Some(Arc::new(client)))
}

fn build_rescrape_client(config: &BridgeConfig) -> anyhow::Result<Option<Arc<dyn RescrapeClient>>> {
    let Some(scraper_url) = &config.scraper_url else { return Ok(None) };
    Ok(Some(Arc::new(HttpRescrapeClient::new(scraper_url.clone())?)))
}

async fn zombie_sweep_loop(postgres: Arc<PostgresClient>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(ZOMBIE_SWEEP_INTERVAL);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            _ = ticker.tick() => {
                match bridge_worker::rescrape::sweep_zombies(&postgres, None).await {
                    Ok(cleared) if cleared > 0 => info!(cleared, "zombie sweep cleared stuck rescrapes"),
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "zombie sweep failed"),
                }
            }
        }
    }
}

async fn wait_for_shutdown(shutdown_tx: watch::Sender<bool>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
}
