//! HTTP transport for probe attempts.

use std::error::Error as StdError;
use std::time::{Duration, Instant};

use super::{Attempt, Fetcher, ProbeError};

/// [`Fetcher`] backed by reqwest. Follows redirects.
#[derive(Debug, Default, Clone)]
pub struct HttpFetcher;

impl HttpFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn get(
        &self,
        url: &str,
        proxy: Option<&str>,
        timeout: Duration,
    ) -> Result<Attempt, ProbeError> {
        let mut builder = reqwest::Client::builder().timeout(timeout);

        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(format!("http://{}", proxy))
                .map_err(|e| ProbeError::Config(format!("bad proxy {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ProbeError::Config(e.to_string()))?;

        let start = Instant::now();

        let response = client.get(url).send().await.map_err(|e| classify(e, timeout))?;
        let status = response.status().as_u16();

        // Read the full body so latency covers the whole transfer
        let _body = response.bytes().await.map_err(|e| classify(e, timeout))?;

        Ok(Attempt {
            status,
            latency: start.elapsed(),
        })
    }
}

fn classify(e: reqwest::Error, timeout: Duration) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout(timeout)
    } else {
        ProbeError::Network(error_chain(&e))
    }
}

/// Render an error with its sources; reqwest's top-level message alone
/// rarely says what went wrong.
fn error_chain(e: &dyn StdError) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_fetch_invalid_url() {
        let result = HttpFetcher::new()
            .get("http://256.256.256.256", None, Duration::from_millis(100))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_http_fetch_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let attempt = HttpFetcher::new()
            .get(&format!("{}/missing", server.uri()), None, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(attempt.status, 404);
    }

    #[tokio::test]
    async fn test_http_fetch_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/new", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let attempt = HttpFetcher::new()
            .get(&format!("{}/old", server.uri()), None, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(attempt.status, 200);
    }

    #[tokio::test]
    async fn test_http_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let result = HttpFetcher::new()
            .get(&server.uri(), None, Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(ProbeError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_http_fetch_dead_proxy() {
        let result = HttpFetcher::new()
            .get("http://example.com", Some("127.0.0.1:1"), Duration::from_secs(2))
            .await;
        assert!(matches!(result, Err(ProbeError::Network(_))));
    }
}
