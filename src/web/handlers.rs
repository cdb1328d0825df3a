//! HTTP request handlers.

use super::AppState;
use crate::probe::{ProbeResult, ReasonCode};
use crate::proxy::CacheSnapshot;
use crate::scheduler::{WatchError, WatchOutcome, WatchSummary};
use crate::target::normalize;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Presentation
// ============================================================================

/// Human-facing summary for a reason code.
pub fn reason_message(reason: ReasonCode) -> &'static str {
    match reason {
        ReasonCode::ProxyOk => "The site looks reachable through the regional proxies.",
        ReasonCode::DirectOk => "No proxy list was available; the site answered a direct request.",
        ReasonCode::DirectFailedStatus => "The direct request got a server error.",
        ReasonCode::DirectFailedTransport => "The direct request failed before any answer arrived.",
        ReasonCode::NoProxiesAndDirectFailed => {
            "No regional proxies were available and the direct request failed too."
        }
        ReasonCode::AllProxiesFailed => "None of the test proxies could reach the site.",
    }
}

// ============================================================================
// API: Check
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub target: String,
    /// Skip the proxy list and probe directly.
    #[serde(default)]
    pub direct: bool,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub host: String,
    pub url: String,
    pub message: &'static str,
    pub result: ProbeResult,
}

pub async fn handle_check(
    State(state): State<AppState>,
    Json(req): Json<CheckRequest>,
) -> impl IntoResponse {
    let target = match normalize(&req.target) {
        Ok(t) => t,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    tracing::info!("Checking {}", target.host());

    let result = if req.direct {
        state.prober.probe_direct(&target).await
    } else {
        state.prober.check(&target).await
    };

    Json(CheckResponse {
        host: target.host().to_string(),
        url: target.url().to_string(),
        message: reason_message(result.reason),
        result,
    })
    .into_response()
}

// ============================================================================
// API: Watches
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct WatchRequest {
    pub subscriber: String,
    pub target: String,
    pub interval_minutes: u32,
}

#[derive(Debug, Serialize)]
pub struct WatchResponse {
    pub outcome: WatchOutcome,
    pub host: String,
    pub interval_minutes: u32,
}

pub async fn handle_put_watch(
    State(state): State<AppState>,
    Json(req): Json<WatchRequest>,
) -> impl IntoResponse {
    if req.subscriber.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "subscriber is required").into_response();
    }

    let target = match normalize(&req.target) {
        Ok(t) => t,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let host = target.host().to_string();

    match state
        .scheduler
        .start_or_update_watch(req.subscriber.trim(), target, req.interval_minutes)
        .await
    {
        Ok(outcome) => {
            let status = match outcome {
                WatchOutcome::Fresh => StatusCode::CREATED,
                WatchOutcome::Updated => StatusCode::OK,
            };
            let body = WatchResponse {
                outcome,
                host,
                interval_minutes: req.interval_minutes,
            };
            (status, Json(body)).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct WatchQuery {
    pub subscriber: Option<String>,
}

pub async fn handle_list_watches(
    State(state): State<AppState>,
    Query(query): Query<WatchQuery>,
) -> Json<Vec<WatchSummary>> {
    Json(state.scheduler.list_watches(query.subscriber.as_deref()).await)
}

pub async fn handle_delete_watch(
    State(state): State<AppState>,
    Path((subscriber, host)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.scheduler.cancel_watch(&subscriber, &host).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e @ WatchError::NotFound { .. }) => {
            (StatusCode::NOT_FOUND, e.to_string()).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub proxies: CacheSnapshot,
    pub watches: usize,
    pub max_proxies: usize,
}

pub async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        proxies: state.proxies.snapshot().await,
        watches: state.scheduler.watch_count().await,
        max_proxies: state.config.max_proxies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::probe::{Attempt, Fetcher, ProbeError, Prober};
    use crate::proxy::{FeedError, ProxyFeed, ProxySource};
    use crate::scheduler::{LogNotifier, WatchScheduler};
    use axum::response::Response;
    use std::sync::Arc;
    use std::time::Duration;

    struct DeadFeed;

    #[async_trait::async_trait]
    impl ProxyFeed for DeadFeed {
        async fn fetch(&self) -> Result<String, FeedError> {
            Err(FeedError::Transport("offline".into()))
        }
    }

    /// Answers every request with a fixed status.
    struct FixedFetcher(u16);

    #[async_trait::async_trait]
    impl Fetcher for FixedFetcher {
        async fn get(&self, _: &str, _: Option<&str>, _: Duration) -> Result<Attempt, ProbeError> {
            Ok(Attempt {
                status: self.0,
                latency: Duration::from_millis(5),
            })
        }
    }

    fn state(status: u16) -> AppState {
        let config = ServerConfig::default();
        let proxies = Arc::new(ProxySource::new(Arc::new(DeadFeed), config.proxy_cache_ttl));
        let prober = Arc::new(Prober::new(
            proxies.clone(),
            Arc::new(FixedFetcher(status)),
            config.max_proxies,
            config.attempt_timeout,
        ));
        let scheduler = Arc::new(WatchScheduler::new(
            prober.clone(),
            Arc::new(LogNotifier),
            config.min_watch_minutes..=config.max_watch_minutes,
        ));
        AppState {
            config,
            proxies,
            prober,
            scheduler,
        }
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_check_direct_fallback() {
        let req = CheckRequest {
            target: "Example.com".into(),
            direct: false,
        };
        let response = handle_check(State(state(200)), Json(req)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["host"], "example.com");
        assert_eq!(body["result"]["reason"], "direct_ok");
        assert_eq!(body["result"]["attempt_count"], 0);
    }

    #[tokio::test]
    async fn test_check_rejects_empty_target() {
        let req = CheckRequest {
            target: "  ".into(),
            direct: false,
        };
        let response = handle_check(State(state(200)), Json(req)).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_forced_direct_failure() {
        let req = CheckRequest {
            target: "example.com".into(),
            direct: true,
        };
        let response = handle_check(State(state(503)), Json(req)).await.into_response();
        let body = json_body(response).await;
        assert_eq!(body["result"]["reason"], "direct_failed_status");
        assert_eq!(body["message"], reason_message(ReasonCode::DirectFailedStatus));
    }

    #[tokio::test]
    async fn test_watch_lifecycle() {
        let state = state(200);
        let put = |interval_minutes| WatchRequest {
            subscriber: "chat-1".into(),
            target: "https://Example.com/".into(),
            interval_minutes,
        };

        let created = handle_put_watch(State(state.clone()), Json(put(5))).await.into_response();
        assert_eq!(created.status(), StatusCode::CREATED);

        let updated = handle_put_watch(State(state.clone()), Json(put(60))).await.into_response();
        assert_eq!(updated.status(), StatusCode::OK);
        assert_eq!(json_body(updated).await["outcome"], "updated");

        let rejected = handle_put_watch(State(state.clone()), Json(put(2))).await.into_response();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        let Json(listed) = handle_list_watches(
            State(state.clone()),
            Query(WatchQuery {
                subscriber: Some("chat-1".into()),
            }),
        )
        .await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].interval_minutes, 60);

        let path = Path(("chat-1".to_string(), "example.com".to_string()));
        let deleted = handle_delete_watch(State(state.clone()), path).await.into_response();
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let path = Path(("chat-1".to_string(), "example.com".to_string()));
        let missing = handle_delete_watch(State(state.clone()), path).await.into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let Json(status) = handle_status(State(state)).await;
        assert_eq!(status.watches, 0);
        assert_eq!(status.proxies.cached, 0);
    }
}
