// Feed service - polls the source and publishes normalized windows
use crate::application::clock::Clock;
use crate::application::normalizer::{WindowSettings, normalize};
use crate::application::telemetry_source::TelemetrySource;
use crate::domain::error::FeedError;
use crate::domain::telemetry::FeedSnapshot;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub poll_interval: Duration,
    pub window: WindowSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Published { samples: usize },
    /// The previous window is still published, with the error next to it.
    Failed(FeedError),
    /// Another refresh was already in flight.
    Skipped,
    /// The feed has been stopped; nothing was published.
    Inactive,
}

impl RefreshOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Published { .. } => "published",
            Self::Failed(_) => "failed",
            Self::Skipped => "skipped",
            Self::Inactive => "inactive",
        }
    }
}

/// Owns the published [`FeedSnapshot`]. Refreshes never overlap, and
/// nothing is published once [`TelemetryFeed::stop`] has been called.
pub struct TelemetryFeed {
    source: Arc<dyn TelemetrySource>,
    clock: Arc<dyn Clock>,
    settings: FeedSettings,
    state: watch::Sender<FeedSnapshot>,
    in_flight: tokio::sync::Mutex<()>,
    alive: watch::Sender<bool>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryFeed {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        clock: Arc<dyn Clock>,
        settings: FeedSettings,
    ) -> Self {
        let (state, _) = watch::channel(FeedSnapshot::default());
        let (alive, _) = watch::channel(true);
        Self {
            source,
            clock,
            settings,
            state,
            in_flight: tokio::sync::Mutex::new(()),
            alive,
            poller: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.state.subscribe()
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }

    /// Resolves once [`TelemetryFeed::stop`] has been called.
    pub async fn stopped(&self) {
        let mut alive = self.alive.subscribe();
        // The sender lives as long as `self`, so this only returns on `false`.
        let _ = alive.wait_for(|alive| !*alive).await;
    }

    /// Run one fetch-normalize-publish cycle. Failures are surfaced in the
    /// snapshot and returned, never raised.
    pub async fn refresh(&self) -> RefreshOutcome {
        if !self.is_alive() {
            return RefreshOutcome::Inactive;
        }

        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!("Refresh already in flight, skipping");
            return RefreshOutcome::Skipped;
        };

        let days = self.settings.window.window_days;
        let fetched = self.source.fetch_graph_data(days).await;
        let now = self.clock.now();
        let result = fetched.and_then(|body| normalize(body, now, &self.settings.window));

        if !self.is_alive() {
            return Self::discarded();
        }

        match result {
            Ok(normalized) => {
                if !normalized.issues.is_empty() {
                    tracing::warn!(
                        "Coerced {} malformed telemetry entries ({} samples dropped)",
                        normalized.issues.len(),
                        normalized.dropped
                    );
                    for issue in &normalized.issues {
                        tracing::debug!("{}", issue);
                    }
                }

                let samples = normalized.window.len();
                let next = FeedSnapshot::published(normalized.window, now);
                if !self.publish(|_| next) {
                    return Self::discarded();
                }
                tracing::info!("Published telemetry window with {} samples", samples);
                RefreshOutcome::Published { samples }
            }
            Err(err) => {
                let message = err.to_string();
                if !self.publish(|current| current.with_error(message)) {
                    return Self::discarded();
                }
                tracing::warn!("Telemetry refresh failed: {}", err);
                RefreshOutcome::Failed(err)
            }
        }
    }

    // Liveness is read under the state lock, and `stop` flips it under the
    // same lock, so nothing lands after `stop` returns.
    fn publish(&self, next: impl FnOnce(&FeedSnapshot) -> FeedSnapshot) -> bool {
        self.state.send_if_modified(|snapshot| {
            if !self.is_alive() {
                return false;
            }
            *snapshot = next(snapshot);
            true
        })
    }

    fn discarded() -> RefreshOutcome {
        tracing::debug!("Discarding telemetry response received after stop");
        RefreshOutcome::Inactive
    }

    /// Fetch now, then every `poll_interval`. No-op if already running or stopped.
    pub fn start(self: &Arc<Self>) {
        let Ok(mut poller) = self.poller.lock() else {
            tracing::error!("Poller handle lock poisoned, feed not started");
            return;
        };
        if poller.is_some() || !self.is_alive() {
            return;
        }

        tracing::info!(
            "Telemetry feed started (interval: {}s, window: {} day(s))",
            self.settings.poll_interval.as_secs(),
            self.settings.window.window_days
        );

        let feed = Arc::clone(self);
        *poller = Some(tokio::spawn(async move { feed.run().await }));
    }

    /// Cancel the poller and wake [`TelemetryFeed::stopped`] waiters.
    /// Responses still in flight are discarded.
    pub fn stop(&self) {
        self.state.send_if_modified(|_| {
            self.alive.send_replace(false);
            false
        });
        if let Ok(mut poller) = self.poller.lock() {
            if let Some(handle) = poller.take() {
                handle.abort();
                tracing::info!("Telemetry feed stopped");
            }
        }
    }

    async fn run(&self) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if self.refresh().await == RefreshOutcome::Inactive {
                break;
            }
        }
    }
}
