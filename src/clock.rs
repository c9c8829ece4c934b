//! Wall-clock sources
//!
//! Everything that classifies "now" against a window reads time through
//! [`Clock`], so the same code runs against the system clock in production
//! and against paused tokio time in tests.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Source of the current wall-clock instant
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Shared handle to a clock
pub type SharedClock = Arc<dyn Clock>;

/// The real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock anchored at a fixed wall-clock instant that advances with
/// `tokio::time`.
///
/// Under `tokio::time::pause()` the runtime skips ahead to the next timer
/// deadline, so wall time read from this clock lands exactly on scheduled
/// boundaries. Useful for simulations and replaying a day on the screen.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    anchor: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl TokioClock {
    /// Create a clock that reads `anchor` right now
    pub fn starting_at(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.anchor + elapsed
    }
}
