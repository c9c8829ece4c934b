//! Window watchers
//!
//! A [`Watcher`] owns one time window and the single [`TransitionTimer`]
//! pending for it. It publishes the window's state on a `watch` channel,
//! re-evaluates exactly at each boundary, and re-arms whenever its inputs
//! change.

use super::timer::TransitionTimer;
use crate::clock::SharedClock;
use crate::window::{Classification, MenuWindow, Phase, PhaseTracker, TimeWindow};
use chrono::{DateTime, Duration, Utc};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Something whose state changes only at computable instants
pub trait Transitions: Clone + PartialEq + Send + Sync + 'static {
    type State: Clone + PartialEq + Debug + Send + Sync + 'static;

    fn state_at(&self, now: DateTime<Utc>) -> Self::State;

    fn phase_at(&self, now: DateTime<Utc>) -> Phase;

    /// Next instant strictly after `now` at which the state may change
    fn next_boundary(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

/// A registration window together with its countdown lead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationWindow {
    pub window: TimeWindow,
    pub lead: Duration,
}

impl Transitions for RegistrationWindow {
    type State = Classification;

    fn state_at(&self, now: DateTime<Utc>) -> Classification {
        self.window.classify(now, self.lead)
    }

    fn phase_at(&self, now: DateTime<Utc>) -> Phase {
        self.state_at(now).phase()
    }

    fn next_boundary(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.window.next_boundary(now, self.lead)
    }
}

impl Transitions for MenuWindow {
    /// Whether the menu is visible
    type State = bool;

    fn state_at(&self, now: DateTime<Utc>) -> bool {
        self.is_visible(now)
    }

    fn phase_at(&self, now: DateTime<Utc>) -> Phase {
        self.phase(now)
    }

    fn next_boundary(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        MenuWindow::next_boundary(self, now)
    }
}

/// Monotonic revision counter bumped whenever any watched state changes
#[derive(Debug, Clone)]
pub struct ChangeSignal(Arc<watch::Sender<u64>>);

impl ChangeSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self(Arc::new(tx))
    }

    pub fn bump(&self) {
        self.0.send_modify(|revision| *revision += 1);
    }

    pub fn revision(&self) -> u64 {
        *self.0.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.0.subscribe()
    }
}

impl Default for ChangeSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner of a window's state and its pending wake-up.
///
/// Dropping the watcher stops its task and cancels the wake-up.
pub struct Watcher<T: Transitions> {
    inputs: watch::Sender<T>,
    state: watch::Receiver<T::State>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl<T: Transitions> Watcher<T> {
    /// Start watching `inputs`, bumping `signal` on every state change
    pub fn spawn(
        inputs: T,
        clock: SharedClock,
        max_delay: std::time::Duration,
        signal: Option<ChangeSignal>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(inputs.state_at(clock.now()));
        let (inputs_tx, inputs_rx) = watch::channel(inputs);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            inputs_rx,
            state_tx,
            clock,
            max_delay,
            signal,
            cancel.clone(),
        ));

        Self {
            inputs: inputs_tx,
            state: state_rx,
            cancel,
            task,
        }
    }

    /// Replace the governing inputs.
    ///
    /// Returns `false` (and leaves the pending wake-up alone) when the
    /// inputs are unchanged.
    pub fn update(&self, inputs: T) -> bool {
        self.inputs.send_if_modified(|current| {
            if *current == inputs {
                false
            } else {
                *current = inputs;
                true
            }
        })
    }

    pub fn inputs(&self) -> T {
        self.inputs.borrow().clone()
    }

    /// Current published state
    pub fn state(&self) -> T::State {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<T::State> {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl<T: Transitions> Drop for Watcher<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run<T: Transitions>(
    mut inputs_rx: watch::Receiver<T>,
    state_tx: watch::Sender<T::State>,
    clock: SharedClock,
    max_delay: std::time::Duration,
    signal: Option<ChangeSignal>,
    cancel: CancellationToken,
) {
    let mut timer = TransitionTimer::new(max_delay);
    let mut current = inputs_rx.borrow_and_update().clone();
    let mut tracker = PhaseTracker::new(current.phase_at(clock.now()));

    loop {
        let now = clock.now();

        if tracker.advance(current.phase_at(now)) {
            let next = current.state_at(now);
            let changed = state_tx.send_if_modified(|state| {
                if *state == next {
                    false
                } else {
                    *state = next.clone();
                    true
                }
            });

            if changed {
                tracing::debug!(state = ?next, at = %now, "Window state changed");
                if let Some(signal) = &signal {
                    signal.bump();
                }
            }
        } else {
            tracing::debug!(at = %now, "Ignoring observation behind current phase");
        }

        match current.next_boundary(now) {
            Some(at) => {
                let delay = timer.arm(now, at);
                tracing::trace!(boundary = %at, delay_ms = delay.as_millis() as u64, "Armed transition");
            }
            None => {
                timer.disarm();
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = inputs_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                current = inputs_rx.borrow_and_update().clone();
                tracker.reset(current.phase_at(clock.now()));
            }
            _ = timer.fired() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, TokioClock};
    use crate::window::ServingHours;
    use chrono::TimeZone;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 30, 0).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
    }

    fn registration(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> RegistrationWindow {
        RegistrationWindow {
            window: TimeWindow::new(Some(start), end),
            lead: Duration::hours(2),
        }
    }

    fn max_delay() -> std::time::Duration {
        std::time::Duration::from_millis((1 << 31) - 1)
    }

    #[tokio::test(start_paused = true)]
    async fn test_transitions_at_boundaries() {
        let clock = Arc::new(TokioClock::starting_at(anchor()));
        let watcher = Watcher::spawn(
            registration(at(14, 0), Some(at(16, 0))),
            clock.clone(),
            max_delay(),
            None,
        );
        assert_eq!(watcher.state(), Classification::Countdown);

        let mut rx = watcher.subscribe();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Classification::Open);
        assert_eq!(clock.now(), at(14, 0));

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Classification::Closed);
        assert_eq!(clock.now(), at(16, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_cancels_pending_wakeup() {
        let clock = Arc::new(TokioClock::starting_at(anchor()));
        let watcher = Watcher::spawn(registration(at(13, 30), None), clock.clone(), max_delay(), None);
        assert_eq!(watcher.state(), Classification::Countdown);

        let mut rx = watcher.subscribe();
        assert!(watcher.update(registration(at(17, 30), None)));

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Classification::Upcoming);
        assert_eq!(clock.now(), anchor());

        // the old 13:30 boundary must not fire
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Classification::Countdown);
        assert_eq!(clock.now(), at(15, 30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_inputs_are_ignored() {
        let clock = Arc::new(TokioClock::starting_at(anchor()));
        let inputs = registration(at(14, 0), None);
        let watcher = Watcher::spawn(inputs, clock, max_delay(), None);
        assert!(!watcher.update(inputs));
        assert_eq!(watcher.inputs(), inputs);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clamped_wakeups_reach_far_boundary() {
        let clock = Arc::new(TokioClock::starting_at(anchor()));
        let watcher = Watcher::spawn(
            registration(anchor() + Duration::hours(5), None),
            clock.clone(),
            std::time::Duration::from_secs(3600),
            None,
        );
        assert_eq!(watcher.state(), Classification::Upcoming);

        let mut rx = watcher.subscribe();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Classification::Countdown);
        assert_eq!(clock.now(), anchor() + Duration::hours(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_bumps_on_change() {
        let clock = Arc::new(TokioClock::starting_at(anchor()));
        let signal = ChangeSignal::new();
        let mut revisions = signal.subscribe();
        let _watcher = Watcher::spawn(
            registration(at(14, 0), None),
            clock,
            max_delay(),
            Some(signal.clone()),
        );

        revisions.changed().await.unwrap();
        assert_eq!(signal.revision(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_task() {
        let clock = Arc::new(TokioClock::starting_at(anchor()));
        let watcher = Watcher::spawn(registration(at(14, 0), None), clock, max_delay(), None);
        let mut rx = watcher.subscribe();
        drop(watcher);
        assert!(rx.changed().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_menu_visibility_flips() {
        let clock = Arc::new(TokioClock::starting_at(at(6, 0)));
        let hours = ServingHours {
            opens: at(8, 30),
            closes: at(12, 0),
        };
        let window = MenuWindow::from_hours([&hours], Duration::hours(1));
        let watcher = Watcher::spawn(window, clock.clone(), max_delay(), None);
        assert!(!watcher.state());

        let mut rx = watcher.subscribe();
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
        assert_eq!(clock.now(), at(7, 30));

        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
        assert!(clock.now() > at(13, 0));
    }
}
