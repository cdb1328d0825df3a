//! Proxy feed: fetches the raw newline-separated `host:port` list.

use std::time::Duration;

use thiserror::Error;

/// Proxy feed failures. Never surfaced past the proxy source.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Transport(String),
    #[error("feed answered HTTP {0}")]
    Status(u16),
}

/// Source of the raw proxy list body.
#[async_trait::async_trait]
pub trait ProxyFeed: Send + Sync {
    /// Fetch the feed body. Non-2xx answers are errors.
    async fn fetch(&self) -> Result<String, FeedError>;
}

/// Plain-text HTTP feed, no authentication.
pub struct HttpProxyFeed {
    url: String,
    client: reqwest::Client,
}

impl HttpProxyFeed {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl ProxyFeed for HttpProxyFeed {
    async fn fetch(&self) -> Result<String, FeedError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))
    }
}

/// Split a feed body into candidates: one per non-empty trimmed line, feed order kept.
pub fn parse_feed(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
