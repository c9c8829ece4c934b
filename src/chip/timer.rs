//! One-shot transition timer
//!
//! Holds at most one pending wake-up. Arming replaces (and thereby cancels)
//! whatever was pending; dropping the timer cancels it too.

use chrono::{DateTime, Utc};
use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, Sleep};

/// Longest single sleep. Far-future boundaries are reached through a chain
/// of clamped wake-ups, each of which re-evaluates and re-arms.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis((1 << 31) - 1);

/// A cancellable wake-up at a wall-clock instant
#[derive(Debug)]
pub struct TransitionTimer {
    sleep: Option<Pin<Box<Sleep>>>,
    target: Option<DateTime<Utc>>,
    max_delay: Duration,
}

impl TransitionTimer {
    pub fn new(max_delay: Duration) -> Self {
        Self {
            sleep: None,
            target: None,
            max_delay,
        }
    }

    /// Arm the timer for `at`, cancelling any pending wake-up.
    ///
    /// Returns the delay actually slept, clamped to the maximum delay.
    /// Instants at or before `now` fire immediately.
    pub fn arm(&mut self, now: DateTime<Utc>, at: DateTime<Utc>) -> Duration {
        let delay = (at - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
            .min(self.max_delay);

        self.sleep = Some(Box::pin(sleep(delay)));
        self.target = Some(at);
        delay
    }

    /// Cancel the pending wake-up, if any
    pub fn disarm(&mut self) -> bool {
        self.target = None;
        self.sleep.take().is_some()
    }

    /// The boundary the pending wake-up was armed for
    pub fn target(&self) -> Option<DateTime<Utc>> {
        self.target
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Resolve when the pending wake-up fires, returning the instant it was
    /// armed for. Never resolves while disarmed.
    ///
    /// Cancel safe: dropping the future keeps the wake-up pending.
    pub async fn fired(&mut self) -> Option<DateTime<Utc>> {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
                self.target.take()
            }
            None => pending().await,
        }
    }
}

impl Default for TransitionTimer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_at_target() {
        let mut timer = TransitionTimer::default();
        let target = anchor() + chrono::Duration::minutes(5);

        let delay = timer.arm(anchor(), target);
        assert_eq!(delay, Duration::from_secs(300));
        assert!(timer.is_armed());

        let started = tokio::time::Instant::now();
        assert_eq!(timer.fired().await, Some(target));
        assert_eq!(started.elapsed(), Duration::from_secs(300));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_target_fires_immediately() {
        let mut timer = TransitionTimer::default();
        let delay = timer.arm(anchor(), anchor() - chrono::Duration::minutes(1));
        assert_eq!(delay, Duration::ZERO);
        assert!(timer.fired().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_far_future_is_clamped() {
        let mut timer = TransitionTimer::new(Duration::from_secs(60));
        let far = anchor() + chrono::Duration::days(365 * 50);

        let delay = timer.arm(anchor(), far);
        assert_eq!(delay, Duration::from_secs(60));
        assert_eq!(timer.target(), Some(far));

        let default_clamp = TransitionTimer::default().arm(anchor(), far);
        assert_eq!(default_clamp, DEFAULT_MAX_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_pending() {
        let mut timer = TransitionTimer::default();
        timer.arm(anchor(), anchor() + chrono::Duration::hours(1));
        let second = anchor() + chrono::Duration::minutes(1);
        timer.arm(anchor(), second);

        let started = tokio::time::Instant::now();
        assert_eq!(timer.fired().await, Some(second));
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_never_fires() {
        let mut timer = TransitionTimer::default();
        timer.arm(anchor(), anchor() + chrono::Duration::seconds(1));
        assert!(timer.disarm());
        assert!(!timer.disarm());

        let outcome = tokio::time::timeout(Duration::from_secs(10), timer.fired()).await;
        assert!(outcome.is_err());
    }
}
