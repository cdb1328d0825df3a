//! ReachWatch - regional reachability checks and change watches
//!
//! Probes targets through a rotating list of regional proxies, falls back to
//! a direct request when the list is empty, and re-checks watched targets on
//! a timer, reporting only reachability flips.

mod config;
mod probe;
mod proxy;
mod scheduler;
mod target;
mod web;

use config::ServerConfig;
use probe::{HttpFetcher, Prober};
use proxy::{HttpProxyFeed, ProxySource};
use scheduler::{LogNotifier, Notifier, WatchScheduler, WebhookNotifier};
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("reachwatch=info".parse()?),
        )
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting ReachWatch on port {}...", cfg.http_port);
    tracing::info!("Using proxy feed {}", cfg.proxy_feed_url);

    let feed = HttpProxyFeed::new(&cfg.proxy_feed_url, cfg.feed_timeout)?;
    let proxies = Arc::new(ProxySource::new(Arc::new(feed), cfg.proxy_cache_ttl));

    let prober = Arc::new(Prober::new(
        proxies.clone(),
        Arc::new(HttpFetcher::new()),
        cfg.max_proxies,
        cfg.attempt_timeout,
    ));

    let notifier: Arc<dyn Notifier> = match &cfg.notify_url {
        Some(url) => {
            tracing::info!("Delivering watch notifications to {}", url);
            Arc::new(WebhookNotifier::new(url, cfg.attempt_timeout)?)
        }
        None => Arc::new(LogNotifier),
    };

    let scheduler = Arc::new(WatchScheduler::new(
        prober.clone(),
        notifier,
        cfg.min_watch_minutes..=cfg.max_watch_minutes,
    ));

    // Start API server
    let server = Server::new(cfg, proxies, prober, scheduler.clone());
    server.start(shutdown_signal()).await?;

    scheduler.shutdown().await;
    tracing::info!("ReachWatch stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
