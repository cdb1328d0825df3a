//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::probe::Prober;
use crate::proxy::ProxySource;
use crate::scheduler::WatchScheduler;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub proxies: Arc<ProxySource>,
    pub prober: Arc<Prober>,
    pub scheduler: Arc<WatchScheduler>,
}

/// HTTP API for ReachWatch.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(
        config: ServerConfig,
        proxies: Arc<ProxySource>,
        prober: Arc<Prober>,
        scheduler: Arc<WatchScheduler>,
    ) -> Self {
        Self {
            state: AppState {
                config,
                proxies,
                prober,
                scheduler,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/api/check", post(handlers::handle_check))
            .route(
                "/api/watches",
                get(handlers::handle_list_watches).put(handlers::handle_put_watch),
            )
            .route(
                "/api/watches/{subscriber}/{host}",
                delete(handlers::handle_delete_watch),
            )
            .route("/api/status", get(handlers::handle_status))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(64 * 1024))
            .with_state(self.state.clone())
    }

    /// Serve on the configured port until `shutdown` resolves.
    pub async fn start<F>(
        &self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
