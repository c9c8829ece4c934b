//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::config::ApiConfig;
use crate::display::DisplayBoard;
use crate::poller::{DataStore, Poller};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Last good data for every dataset
    pub store: Arc<DataStore>,
    /// Background poller, for manual refreshes and status
    pub poller: Arc<Poller>,
    /// Display model and its change signal
    pub board: Arc<DisplayBoard>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Longest wait for a display change
    pub long_poll: Duration,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(poller: Arc<Poller>, board: Arc<DisplayBoard>, config: ApiConfig) -> Self {
        Self {
            store: Arc::clone(poller.store()),
            poller,
            board,
            config: Arc::new(config),
            long_poll: Duration::from_secs(30),
            start_time: Instant::now(),
        }
    }

    /// Builder method: cap long-poll requests at `long_poll`
    pub fn with_long_poll(mut self, long_poll: Duration) -> Self {
        self.long_poll = long_poll;
        self
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
