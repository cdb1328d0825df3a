//! Configuration module for ReachWatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default proxy feed: plain-text `host:port` list of Hungarian HTTPS proxies.
pub const DEFAULT_PROXY_FEED: &str =
    "https://www.proxy-list.download/api/v1/get?type=https&country=HU";

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the API server (default: 8080)
    pub http_port: u16,
    /// Proxy feed URL
    pub proxy_feed_url: String,
    /// How long a fetched proxy list stays fresh (default: 900s)
    pub proxy_cache_ttl: Duration,
    /// Max proxy candidates tried per probe (default: 8)
    pub max_proxies: usize,
    /// Timeout for the proxy feed fetch (default: 10s)
    pub feed_timeout: Duration,
    /// Timeout for a single direct or proxied attempt (default: 12s)
    pub attempt_timeout: Duration,
    /// Smallest accepted watch interval in minutes (default: 5)
    pub min_watch_minutes: u32,
    /// Largest accepted watch interval in minutes (default: 1440)
    pub max_watch_minutes: u32,
    /// Optional webhook that receives watch transitions as JSON
    pub notify_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            proxy_feed_url: DEFAULT_PROXY_FEED.to_string(),
            proxy_cache_ttl: Duration::from_secs(900),
            max_proxies: 8,
            feed_timeout: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(12),
            min_watch_minutes: 5,
            max_watch_minutes: 1440,
            notify_url: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `REACHWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `REACHWATCH_PROXY_FEED`: proxy feed URL
    /// - `REACHWATCH_PROXY_CACHE_TTL`: cache TTL in seconds (default: 900)
    /// - `REACHWATCH_MAX_PROXIES`: candidates per probe (default: 8)
    /// - `REACHWATCH_FEED_TIMEOUT`: feed timeout in seconds (default: 10)
    /// - `REACHWATCH_ATTEMPT_TIMEOUT`: per-attempt timeout in seconds (default: 12)
    /// - `REACHWATCH_WATCH_MIN_MINUTES` / `REACHWATCH_WATCH_MAX_MINUTES`: interval bounds
    /// - `REACHWATCH_NOTIFY_URL`: webhook for watch transitions (default: unset)
    pub fn load() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = parse_var(&lookup, "REACHWATCH_HTTP_PORT") {
            cfg.http_port = port;
        }

        if let Some(feed) = lookup("REACHWATCH_PROXY_FEED") {
            let feed = feed.trim();
            if !feed.is_empty() {
                cfg.proxy_feed_url = feed.to_string();
            }
        }

        if let Some(secs) = parse_var(&lookup, "REACHWATCH_PROXY_CACHE_TTL") {
            cfg.proxy_cache_ttl = Duration::from_secs(secs);
        }

        if let Some(max) = parse_var(&lookup, "REACHWATCH_MAX_PROXIES") {
            cfg.max_proxies = max;
        }

        if let Some(secs) = parse_var::<u64, _>(&lookup, "REACHWATCH_FEED_TIMEOUT") {
            if secs > 0 {
                cfg.feed_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(secs) = parse_var::<u64, _>(&lookup, "REACHWATCH_ATTEMPT_TIMEOUT") {
            if secs > 0 {
                cfg.attempt_timeout = Duration::from_secs(secs);
            }
        }

        let min = parse_var(&lookup, "REACHWATCH_WATCH_MIN_MINUTES")
            .unwrap_or(cfg.min_watch_minutes);
        let max = parse_var(&lookup, "REACHWATCH_WATCH_MAX_MINUTES")
            .unwrap_or(cfg.max_watch_minutes);
        if min > 0 && min <= max {
            cfg.min_watch_minutes = min;
            cfg.max_watch_minutes = max;
        } else {
            tracing::warn!(
                "Ignoring invalid watch interval bounds {}..={}, keeping {}..={}",
                min,
                max,
                cfg.min_watch_minutes,
                cfg.max_watch_minutes
            );
        }

        cfg.notify_url = lookup("REACHWATCH_NOTIFY_URL")
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        cfg
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|raw| raw.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.proxy_feed_url, DEFAULT_PROXY_FEED);
        assert_eq!(cfg.proxy_cache_ttl, Duration::from_secs(900));
        assert_eq!(cfg.max_proxies, 8);
        assert_eq!(cfg.feed_timeout, Duration::from_secs(10));
        assert_eq!(cfg.attempt_timeout, Duration::from_secs(12));
        assert_eq!((cfg.min_watch_minutes, cfg.max_watch_minutes), (5, 1440));
        assert!(cfg.notify_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let cfg = from_pairs(&[
            ("REACHWATCH_HTTP_PORT", "9090"),
            ("REACHWATCH_PROXY_FEED", "http://feed.local/list"),
            ("REACHWATCH_PROXY_CACHE_TTL", "60"),
            ("REACHWATCH_MAX_PROXIES", "3"),
            ("REACHWATCH_ATTEMPT_TIMEOUT", "4"),
            ("REACHWATCH_NOTIFY_URL", "http://hook.local/"),
        ]);
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.proxy_feed_url, "http://feed.local/list");
        assert_eq!(cfg.proxy_cache_ttl, Duration::from_secs(60));
        assert_eq!(cfg.max_proxies, 3);
        assert_eq!(cfg.attempt_timeout, Duration::from_secs(4));
        assert_eq!(cfg.notify_url.as_deref(), Some("http://hook.local/"));
    }

    #[test]
    fn test_garbage_keeps_defaults() {
        let cfg = from_pairs(&[
            ("REACHWATCH_HTTP_PORT", "not-a-port"),
            ("REACHWATCH_ATTEMPT_TIMEOUT", "0"),
            ("REACHWATCH_WATCH_MIN_MINUTES", "30"),
            ("REACHWATCH_WATCH_MAX_MINUTES", "10"),
            ("REACHWATCH_NOTIFY_URL", "   "),
        ]);
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.attempt_timeout, Duration::from_secs(12));
        assert_eq!((cfg.min_watch_minutes, cfg.max_watch_minutes), (5, 1440));
        assert!(cfg.notify_url.is_none());
    }
}
