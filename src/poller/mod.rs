//! Background Poller
//!
//! Refreshes every registered source on its own fixed interval and writes
//! the results into the [`DataStore`]. Polls are fire-and-forget: a failure
//! is logged and recorded, the previous data stays in place, and the next
//! tick simply tries again.

mod store;

pub use store::{Cached, DataStore, EventFeed, RestaurantSlot};

use crate::clock::SharedClock;
use crate::sources::{Source, SourceError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Shortest allowed poll interval
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Polls sources into a shared store
pub struct Poller {
    store: Arc<DataStore>,
    clock: SharedClock,
    sources: Vec<PolledSource>,
    running: Mutex<Option<Running>>,
}

#[derive(Clone)]
struct PolledSource {
    source: Arc<dyn Source>,
    interval: Duration,
}

struct Running {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// A registered source and how often it is polled
#[derive(Debug, Clone, Serialize)]
pub struct SourceSchedule {
    pub name: String,
    pub interval_secs: u64,
}

/// Errors from manual refreshes
#[derive(Debug, Error)]
pub enum PollerError {
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl Poller {
    pub fn new(store: Arc<DataStore>, clock: SharedClock) -> Self {
        Self {
            store,
            clock,
            sources: Vec::new(),
            running: Mutex::new(None),
        }
    }

    /// Register a source to be polled every `interval`
    pub fn register(&mut self, source: Arc<dyn Source>, interval: Duration) {
        let interval = interval.max(MIN_INTERVAL);
        tracing::debug!(source = %source.name(), interval_secs = interval.as_secs(), "Registered source");
        self.sources.push(PolledSource { source, interval });
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.store
    }

    pub fn schedule(&self) -> Vec<SourceSchedule> {
        self.sources
            .iter()
            .map(|s| SourceSchedule {
                name: s.source.name().to_string(),
                interval_secs: s.interval.as_secs(),
            })
            .collect()
    }

    /// Spawn one polling task per source. Each polls immediately, then on
    /// its interval. Returns `false` if already running.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let handles = self
            .sources
            .iter()
            .cloned()
            .map(|polled| {
                let store = Arc::clone(&self.store);
                let clock = Arc::clone(&self.clock);
                let cancel = cancel.clone();
                tokio::spawn(poll_loop(polled, store, clock, cancel))
            })
            .collect();

        tracing::info!(sources = self.sources.len(), "Poller started");
        *running = Some(Running { cancel, handles });
        true
    }

    /// Stop all polling tasks and wait for them to finish
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        running.cancel.cancel();
        for handle in running.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Polling task ended abnormally");
            }
        }
        tracing::info!("Poller stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Poll one source right now, outside its schedule
    pub async fn refresh(&self, name: &str) -> Result<(), PollerError> {
        let polled = self
            .sources
            .iter()
            .find(|s| s.source.name() == name)
            .ok_or_else(|| PollerError::UnknownSource(name.to_string()))?;

        poll_once(polled.source.as_ref(), &self.store, &self.clock).await?;
        Ok(())
    }

    /// Poll every source once, concurrently
    pub async fn refresh_all(&self) {
        let polls = self
            .sources
            .iter()
            .map(|s| poll_once(s.source.as_ref(), &self.store, &self.clock));
        futures_util::future::join_all(polls).await;
    }
}

async fn poll_loop(
    polled: PolledSource,
    store: Arc<DataStore>,
    clock: SharedClock,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(polled.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = poll_once(polled.source.as_ref(), &store, &clock) => {}
                }
            }
        }
    }

    tracing::debug!(source = %polled.source.name(), "Polling task exited");
}

/// Fetch one source into the store, recording the failure on error
async fn poll_once(source: &dyn Source, store: &DataStore, clock: &SharedClock) -> Result<(), SourceError> {
    let at = clock.now();
    let started = std::time::Instant::now();

    match source.fetch().await {
        Ok(snapshot) => {
            tracing::info!(
                source = %source.name(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Poll succeeded"
            );
            store.apply(snapshot, at);
            Ok(())
        }
        Err(e) => {
            tracing::warn!(source = %source.name(), error = %e, "Poll failed, keeping previous data");
            store.record_failure(&source.dataset(), &e, at);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::sources::{DatasetKey, Event, Snapshot};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Succeeds on the first call, fails on every later one
    struct FlakySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Source for FlakySource {
        fn name(&self) -> &str {
            "flaky"
        }

        fn dataset(&self) -> DatasetKey {
            DatasetKey::Events("Flaky".to_string())
        }

        async fn fetch(&self) -> Result<Snapshot, SourceError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Snapshot::Events {
                    subtitle: "Flaky".to_string(),
                    events: vec![Event {
                        id: "1".to_string(),
                        title: "Sauna".to_string(),
                        starts: Utc.with_ymd_and_hms(2024, 3, 4, 18, 0, 0).unwrap(),
                        registration_starts: None,
                        registration_ends: None,
                        location: None,
                    }],
                })
            } else {
                Err(SourceError::Status { status: 503 })
            }
        }
    }

    fn setup() -> (Poller, Arc<FlakySource>) {
        let store = Arc::new(DataStore::new(["Flaky"], Vec::<String>::new(), false));
        let clock = Arc::new(TokioClock::starting_at(
            Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap(),
        ));
        let source = Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
        });
        let mut poller = Poller::new(store, clock);
        poller.register(source.clone(), Duration::from_secs(300));
        (poller, source)
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_keeps_previous_data() {
        let (poller, _source) = setup();

        poller.refresh("flaky").await.unwrap();
        let result = poller.refresh("flaky").await;
        assert!(matches!(result, Err(PollerError::Source(SourceError::Status { status: 503 }))));

        let feeds = poller.store().events();
        assert_eq!(feeds[0].cached.value.as_ref().unwrap()[0].title, "Sauna");
        assert!(feeds[0].cached.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_source() {
        let (poller, _source) = setup();
        assert!(matches!(
            poller.refresh("nope").await,
            Err(PollerError::UnknownSource(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval_until_stopped() {
        let (poller, source) = setup();

        assert!(poller.start().await);
        assert!(!poller.start().await);

        // first tick is immediate
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        poller.stop().await;
        assert!(!poller.is_running().await);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_schedule_enforces_minimum_interval() {
        let store = Arc::new(DataStore::new(Vec::<String>::new(), Vec::<String>::new(), false));
        let mut poller = Poller::new(store, Arc::new(crate::clock::SystemClock));
        poller.register(
            Arc::new(FlakySource {
                calls: AtomicUsize::new(0),
            }),
            Duration::ZERO,
        );
        assert_eq!(poller.schedule()[0].interval_secs, 1);
    }
}
