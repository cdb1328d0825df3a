//! Notification sinks for watch transitions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::probe::ProbeResult;
use crate::target::ProbeTarget;

/// A reachability flip observed by a watch.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub subscriber: String,
    pub host: String,
    pub url: String,
    pub result: ProbeResult,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        subscriber: &str,
        target: &ProbeTarget,
        result: ProbeResult,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            subscriber: subscriber.to_string(),
            host: target.host().to_string(),
            url: target.url().to_string(),
            result,
            at,
        }
    }

    pub fn became_reachable(&self) -> bool {
        self.result.reachable
    }
}

/// Receives watch transitions.
///
/// Called while the scheduler holds its registry lock; implementations
/// should hand the notification off quickly.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Writes transitions to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) {
        log_transition(&notification);
    }
}

/// Logs transitions and POSTs them as JSON to a webhook.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: Notification) {
        log_transition(&notification);

        let sent = self
            .client
            .post(&self.url)
            .json(&notification)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        if let Err(e) = sent {
            tracing::error!(
                "Failed to deliver notification for {} to {}: {}",
                notification.host,
                self.url,
                e
            );
        }
    }
}

fn log_transition(notification: &Notification) {
    if notification.became_reachable() {
        tracing::info!(
            "Watch [{}] {} is reachable again (proxy: {})",
            notification.subscriber,
            notification.host,
            notification.result.proxy_used.as_deref().unwrap_or("direct")
        );
    } else {
        tracing::info!(
            "Watch [{}] {} became unreachable: {}",
            notification.subscriber,
            notification.host,
            notification.result.errors.join("; ")
        );
    }
}
