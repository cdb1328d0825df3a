//! Reachability probing.
//!
//! Tries proxy candidates strictly in feed order, one at a time, and stops
//! at the first one that gets an answer. With no candidates at all it falls
//! back to a single direct request.

mod http;

pub use http::*;

use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::proxy::{ProxyCandidate, ProxySource};
use crate::target::ProbeTarget;

/// Sentinel appended to the error trail when the proxy list was empty.
pub const EMPTY_PROXY_LIST: &str = "proxy list empty";

/// Per-attempt failure.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Why a probe ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// A proxy candidate got an answer.
    ProxyOk,
    DirectOk,
    DirectFailedStatus,
    DirectFailedTransport,
    NoProxiesAndDirectFailed,
    AllProxiesFailed,
}

/// Outcome of one probe invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub reachable: bool,
    pub reason: ReasonCode,
    pub proxy_used: Option<ProxyCandidate>,
    pub http_status: Option<u16>,
    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    pub latency: Option<Duration>,
    /// Proxy attempts made; the direct attempt is not counted.
    pub attempt_count: usize,
    /// Diagnostic trail, oldest first.
    pub errors: Vec<String>,
}

fn serialize_millis<S: Serializer>(latency: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match latency {
        Some(d) => s.serialize_some(&(d.as_secs_f64() * 1000.0)),
        None => s.serialize_none(),
    }
}

/// A successful HTTP exchange, whatever the status.
#[derive(Debug, Clone, Copy)]
pub struct Attempt {
    pub status: u16,
    pub latency: Duration,
}

/// One GET against a URL, optionally through an HTTP proxy.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(
        &self,
        url: &str,
        proxy: Option<&str>,
        timeout: Duration,
    ) -> Result<Attempt, ProbeError>;
}

/// Anything that can judge a target's reachability.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &ProbeTarget) -> ProbeResult;
}

/// The origin answered. Any status below 500 counts, error pages included.
pub fn is_reachable_status(status: u16) -> bool {
    (200..500).contains(&status)
}

/// Proxy-first reachability prober.
pub struct Prober {
    proxies: Arc<ProxySource>,
    fetcher: Arc<dyn Fetcher>,
    max_proxies: usize,
    attempt_timeout: Duration,
}

impl Prober {
    pub fn new(
        proxies: Arc<ProxySource>,
        fetcher: Arc<dyn Fetcher>,
        max_proxies: usize,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            proxies,
            fetcher,
            max_proxies,
            attempt_timeout,
        }
    }

    /// Probe `target` through the proxy list, or directly if the list is empty.
    pub async fn check(&self, target: &ProbeTarget) -> ProbeResult {
        let proxies = self.proxies.list_proxies(self.max_proxies).await;

        if proxies.is_empty() {
            tracing::warn!("No proxies available, probing {} directly", target.host());
            let direct = self.probe_direct(target).await;
            if direct.reachable {
                return direct;
            }

            let mut errors = direct.errors;
            errors.push(EMPTY_PROXY_LIST.to_string());
            return ProbeResult {
                reachable: false,
                reason: ReasonCode::NoProxiesAndDirectFailed,
                proxy_used: None,
                http_status: direct.http_status,
                latency: None,
                attempt_count: 0,
                errors,
            };
        }

        let mut errors = Vec::with_capacity(proxies.len());

        for (idx, proxy) in proxies.iter().enumerate() {
            tracing::debug!("Probing {} via proxy {}", target.url(), proxy);

            match self
                .fetcher
                .get(target.url(), Some(proxy), self.attempt_timeout)
                .await
            {
                Ok(attempt) if is_reachable_status(attempt.status) => {
                    return ProbeResult {
                        reachable: true,
                        reason: ReasonCode::ProxyOk,
                        proxy_used: Some(proxy.clone()),
                        http_status: Some(attempt.status),
                        latency: Some(attempt.latency),
                        attempt_count: idx + 1,
                        errors,
                    };
                }
                Ok(attempt) => errors.push(format!("{} → HTTP {}", proxy, attempt.status)),
                Err(e) => errors.push(format!("{}: {}", proxy, e)),
            }
        }

        tracing::info!(
            "All {} proxies failed for {}",
            proxies.len(),
            target.host()
        );

        ProbeResult {
            reachable: false,
            reason: ReasonCode::AllProxiesFailed,
            proxy_used: None,
            http_status: None,
            latency: None,
            attempt_count: proxies.len(),
            errors,
        }
    }

    /// Single direct request, bypassing the proxy list.
    pub async fn probe_direct(&self, target: &ProbeTarget) -> ProbeResult {
        match self.fetcher.get(target.url(), None, self.attempt_timeout).await {
            Ok(attempt) if is_reachable_status(attempt.status) => ProbeResult {
                reachable: true,
                reason: ReasonCode::DirectOk,
                proxy_used: None,
                http_status: Some(attempt.status),
                latency: Some(attempt.latency),
                attempt_count: 0,
                errors: Vec::new(),
            },
            Ok(attempt) => ProbeResult {
                reachable: false,
                reason: ReasonCode::DirectFailedStatus,
                proxy_used: None,
                http_status: Some(attempt.status),
                latency: None,
                attempt_count: 0,
                errors: vec![format!("direct: HTTP {}", attempt.status)],
            },
            Err(e) => ProbeResult {
                reachable: false,
                reason: ReasonCode::DirectFailedTransport,
                proxy_used: None,
                http_status: None,
                latency: None,
                attempt_count: 0,
                errors: vec![format!("direct: {}", e)],
            },
        }
    }
}

#[async_trait::async_trait]
impl Probe for Prober {
    async fn probe(&self, target: &ProbeTarget) -> ProbeResult {
        self.check(target).await
    }
}
