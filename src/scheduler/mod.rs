//! Watch scheduler: periodic re-probing with edge-triggered notifications.
//!
//! Each registration, keyed by (subscriber, host), owns exactly one probe
//! loop. A subscriber hears about changes in reachability, never about
//! repeated identical observations.

mod notify;

pub use notify::*;

use crate::probe::Probe;
use crate::target::ProbeTarget;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};

const MINUTE: Duration = Duration::from_secs(60);

/// Watch management errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("interval {minutes} min is outside {min}..={max} min")]
    InvalidInterval { minutes: u32, min: u32, max: u32 },
    #[error("no watch for {host}")]
    NotFound { host: String },
}

/// Whether a watch request created or replaced a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchOutcome {
    Fresh,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WatchKey {
    subscriber: String,
    host: String,
}

impl WatchKey {
    fn new(subscriber: &str, host: &str) -> Self {
        Self {
            subscriber: subscriber.to_string(),
            host: host.to_lowercase(),
        }
    }
}

struct Registration {
    target: ProbeTarget,
    interval_minutes: u32,
    last_reachable: Option<bool>,
    last_checked: Option<DateTime<Utc>>,
    /// Identity of the loop that owns this registration.
    generation: u64,
    stop: broadcast::Sender<()>,
    /// Per-key exclusion between ticks and cancel/replace. Survives
    /// replacement so a re-registered key keeps the same gate.
    gate: Arc<Mutex<()>>,
}

/// Read-only view of a registration.
#[derive(Debug, Clone, Serialize)]
pub struct WatchSummary {
    pub subscriber: String,
    pub host: String,
    pub url: String,
    pub interval_minutes: u32,
    pub last_reachable: Option<bool>,
    pub last_checked: Option<DateTime<Utc>>,
}

/// True only when there is a previous observation and it differs.
pub fn is_transition(previous: Option<bool>, current: bool) -> bool {
    matches!(previous, Some(p) if p != current)
}

/// Owns every watch registration and its probe loop.
pub struct WatchScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    prober: Arc<dyn Probe>,
    notifier: Arc<dyn Notifier>,
    registry: Mutex<HashMap<WatchKey, Registration>>,
    next_generation: AtomicU64,
    bounds: RangeInclusive<u32>,
}

impl WatchScheduler {
    pub fn new(
        prober: Arc<dyn Probe>,
        notifier: Arc<dyn Notifier>,
        bounds: RangeInclusive<u32>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                prober,
                notifier,
                registry: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                bounds,
            }),
        }
    }

    /// Register a watch, or replace the existing one for the same key.
    ///
    /// The previous loop is stopped before the new one is armed. The first
    /// probe runs one full interval after registration, and the new
    /// registration starts without a baseline.
    pub async fn start_or_update_watch(
        &self,
        subscriber: &str,
        target: ProbeTarget,
        interval_minutes: u32,
    ) -> Result<WatchOutcome, WatchError> {
        if !self.inner.bounds.contains(&interval_minutes) {
            return Err(WatchError::InvalidInterval {
                minutes: interval_minutes,
                min: *self.inner.bounds.start(),
                max: *self.inner.bounds.end(),
            });
        }

        let key = WatchKey::new(subscriber, target.host());

        // Wait out any notification in flight for this key before replacing it.
        let existing = self.inner.gate_for(&key).await;
        let gate = existing.unwrap_or_else(|| Arc::new(Mutex::new(())));
        let _held = gate.lock().await;

        let mut registry = self.inner.registry.lock().await;

        let (outcome, gate) = match registry.remove(&key) {
            Some(previous) => {
                let _ = previous.stop.send(());
                (WatchOutcome::Updated, previous.gate)
            }
            None => (WatchOutcome::Fresh, gate.clone()),
        };

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let (stop_tx, stop_rx) = broadcast::channel(1);

        tracing::info!(
            "Scheduler: {} watch {} for {} every {} min",
            if outcome == WatchOutcome::Fresh { "adding" } else { "updating" },
            key.host,
            key.subscriber,
            interval_minutes
        );

        registry.insert(
            key.clone(),
            Registration {
                target,
                interval_minutes,
                last_reachable: None,
                last_checked: None,
                generation,
                stop: stop_tx,
                gate,
            },
        );
        drop(registry);

        let period = MINUTE * interval_minutes;
        tokio::spawn(run_watch_loop(
            self.inner.clone(),
            key,
            generation,
            period,
            stop_rx,
        ));

        Ok(outcome)
    }

    /// Remove a watch. An in-flight tick for it will not notify.
    pub async fn cancel_watch(&self, subscriber: &str, host: &str) -> Result<(), WatchError> {
        let key = WatchKey::new(subscriber, host);

        let gate = match self.inner.gate_for(&key).await {
            Some(gate) => gate,
            None => return Err(WatchError::NotFound { host: key.host }),
        };
        let _held = gate.lock().await;

        let mut registry = self.inner.registry.lock().await;

        match registry.remove(&key) {
            Some(registration) => {
                let _ = registration.stop.send(());
                tracing::info!("Scheduler: Removed watch {} for {}", key.host, key.subscriber);
                Ok(())
            }
            None => Err(WatchError::NotFound { host: key.host }),
        }
    }

    /// Registrations, optionally limited to one subscriber, ordered by subscriber then host.
    pub async fn list_watches(&self, subscriber: Option<&str>) -> Vec<WatchSummary> {
        let registry = self.inner.registry.lock().await;

        let mut watches: Vec<WatchSummary> = registry
            .iter()
            .filter(|(key, _)| subscriber.map_or(true, |s| key.subscriber == s))
            .map(|(key, reg)| WatchSummary {
                subscriber: key.subscriber.clone(),
                host: key.host.clone(),
                url: reg.target.url().to_string(),
                interval_minutes: reg.interval_minutes,
                last_reachable: reg.last_reachable,
                last_checked: reg.last_checked,
            })
            .collect();

        watches.sort_by(|a, b| (&a.subscriber, &a.host).cmp(&(&b.subscriber, &b.host)));
        watches
    }

    pub async fn watch_count(&self) -> usize {
        self.inner.registry.lock().await.len()
    }

    /// Stop every probe loop and forget all registrations.
    pub async fn shutdown(&self) {
        let mut registry = self.inner.registry.lock().await;
        let count = registry.len();

        for (_, registration) in registry.drain() {
            let _ = registration.stop.send(());
        }

        tracing::info!("Scheduler: Stopped {} watches", count);
    }
}

impl Inner {
    async fn gate_for(&self, key: &WatchKey) -> Option<Arc<Mutex<()>>> {
        let registry = self.registry.lock().await;
        registry.get(key).map(|reg| reg.gate.clone())
    }

    /// Handle one timer tick. Returns false once the loop no longer owns
    /// its registration (cancelled or superseded).
    async fn on_tick(&self, key: &WatchKey, generation: u64) -> bool {
        let target = {
            let registry = self.registry.lock().await;
            match registry.get(key) {
                Some(reg) if reg.generation == generation => reg.target.clone(),
                _ => return false,
            }
        };

        // Add jitter so watches armed together do not probe in lockstep
        let jitter = rand::random::<u64>() % 1000;
        tokio::time::sleep(Duration::from_millis(jitter)).await;

        let result = self.prober.probe(&target).await;

        let gate = match self.gate_for(key).await {
            Some(gate) => gate,
            None => return false,
        };
        let _held = gate.lock().await;

        // Re-check ownership: the watch may have been cancelled or replaced
        // while the probe was running. Only the map update happens under
        // the registry lock; delivery below holds just this key's gate.
        let (previous, now) = {
            let mut registry = self.registry.lock().await;
            let reg = match registry.get_mut(key) {
                Some(reg) if reg.generation == generation => reg,
                _ => {
                    tracing::debug!("Scheduler: Dropping stale result for {}", key.host);
                    return false;
                }
            };

            let now = Utc::now();
            reg.last_checked = Some(now);
            (reg.last_reachable.replace(result.reachable), now)
        };

        if is_transition(previous, result.reachable) {
            tracing::info!(
                "Scheduler: {} became {} for {}",
                key.host,
                if result.reachable { "reachable" } else { "unreachable" },
                key.subscriber
            );

            // Cancel and replace wait on the gate, so neither can complete
            // between the ownership check and delivery.
            self.notifier
                .notify(Notification::new(&key.subscriber, &target, result, now))
                .await;
        }

        true
    }
}

/// Run the probe loop for a single registration.
async fn run_watch_loop(
    inner: Arc<Inner>,
    key: WatchKey,
    generation: u64,
    period: Duration,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let start = tokio::time::Instant::now() + period;
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => break,
            _ = interval.tick() => {
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    live = inner.on_tick(&key, generation) => {
                        if !live {
                            break;
                        }
                    }
                }
            }
        }
    }

    tracing::debug!("Scheduler: Loop for {} (gen {}) ended", key.host, generation);
}
