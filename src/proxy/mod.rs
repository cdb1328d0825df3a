//! Proxy source: fetches, caches and bounds the proxy candidate list.
//!
//! The cache is fail-closed. A failed refresh clears it instead of serving
//! the previous list, so a dead feed degrades to direct probing rather than
//! to probing through proxies that may no longer exist.

mod feed;

pub use feed::*;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A proxy endpoint (`host:port`) as given by the feed.
pub type ProxyCandidate = String;

/// Cached candidate list plus its fetch time.
#[derive(Debug, Default)]
pub struct ProxyCache {
    entries: Vec<ProxyCandidate>,
    fetched_at: Option<Instant>,
}

impl ProxyCache {
    /// Cached entries if non-empty and younger than `ttl`.
    pub fn get(&self, now: Instant, ttl: Duration) -> Option<&[ProxyCandidate]> {
        match self.fetched_at {
            Some(at) if !self.entries.is_empty() && now.duration_since(at) < ttl => {
                Some(&self.entries)
            }
            _ => None,
        }
    }

    /// Replace the whole list; no merging with the previous one.
    pub fn refresh(&mut self, entries: Vec<ProxyCandidate>, now: Instant) {
        self.entries = entries;
        self.fetched_at = Some(now);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.fetched_at = None;
    }
}

/// Point-in-time view of the cache for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    pub cached: usize,
    pub age_seconds: Option<u64>,
    pub ttl_seconds: u64,
}

/// Proxy candidate provider with a TTL cache in front of a [`ProxyFeed`].
pub struct ProxySource {
    feed: Arc<dyn ProxyFeed>,
    ttl: Duration,
    cache: Mutex<ProxyCache>,
}

impl ProxySource {
    pub fn new(feed: Arc<dyn ProxyFeed>, ttl: Duration) -> Self {
        Self {
            feed,
            ttl,
            cache: Mutex::new(ProxyCache::default()),
        }
    }

    /// Up to `max` candidates in feed order. Never fails; degrades to empty.
    ///
    /// Read and refresh happen under one lock, so concurrent callers never
    /// see a half-updated list and a stale cache triggers a single fetch.
    pub async fn list_proxies(&self, max: usize) -> Vec<ProxyCandidate> {
        let mut cache = self.cache.lock().await;

        if let Some(entries) = cache.get(Instant::now(), self.ttl) {
            return entries.iter().take(max).cloned().collect();
        }

        match self.feed.fetch().await {
            Ok(body) => {
                let entries = parse_feed(&body);
                tracing::info!("Proxy feed: loaded {} candidates", entries.len());
                let trimmed = entries.iter().take(max).cloned().collect();
                cache.refresh(entries, Instant::now());
                trimmed
            }
            Err(e) => {
                tracing::warn!("Proxy feed unavailable, clearing cache: {}", e);
                cache.clear();
                Vec::new()
            }
        }
    }

    pub async fn snapshot(&self) -> CacheSnapshot {
        let cache = self.cache.lock().await;
        CacheSnapshot {
            cached: cache.entries.len(),
            age_seconds: cache.fetched_at.map(|at| at.elapsed().as_secs()),
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}
