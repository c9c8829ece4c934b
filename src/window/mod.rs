//! Time-Window Evaluation
//!
//! Pure functions deciding where "now" sits relative to a time window:
//! - [`TimeWindow`]: registration-style window with a countdown lead
//! - [`MenuWindow`]: padded serving hours deciding menu visibility
//! - [`Phase`] / [`PhaseTracker`]: the shared before → active → after machine
//!
//! Nothing here touches timers or I/O; the `chip` module schedules wake-ups
//! at the boundaries computed here.

mod menu;
mod phase;

pub use menu::{parse_lunch_hours, MenuWindow, ServingHours};
pub use phase::{Phase, PhaseTracker};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Where `now` sits relative to a [`TimeWindow`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// The window has no start, nothing to show
    NoWindow,
    /// More than the countdown lead before the start
    Upcoming,
    /// Within the countdown lead before the start
    Countdown,
    /// Started and not yet ended
    Open,
    /// The end instant has been reached
    Closed,
}

impl Classification {
    /// Collapse into the shared three-state machine
    pub fn phase(self) -> Phase {
        match self {
            Classification::Upcoming | Classification::Countdown => Phase::Before,
            Classification::Open => Phase::Active,
            Classification::Closed | Classification::NoWindow => Phase::After,
        }
    }
}

/// A window with an optional start and an optional end.
///
/// Intervals are half-open: `now == start` is open, `now == end` is not.
/// A missing end never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// A window that opens at `start` and never closes
    pub fn open_ended(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Classify `now` against this window with the given countdown lead
    pub fn classify(&self, now: DateTime<Utc>, lead: Duration) -> Classification {
        let Some(start) = self.start else {
            return Classification::NoWindow;
        };

        if now < start - lead {
            Classification::Upcoming
        } else if now < start {
            Classification::Countdown
        } else if self.end.is_some_and(|end| now >= end) {
            Classification::Closed
        } else {
            Classification::Open
        }
    }

    /// The next instant at which [`TimeWindow::classify`] changes its answer
    pub fn next_boundary(&self, now: DateTime<Utc>, lead: Duration) -> Option<DateTime<Utc>> {
        let start = self.start?;
        match self.classify(now, lead) {
            Classification::Upcoming => Some(start - lead),
            Classification::Countdown => Some(start),
            Classification::Open => self.end,
            Classification::Closed | Classification::NoWindow => None,
        }
    }
}

/// Classify `now` against `[start, end)` with a countdown of `lead` before `start`
pub fn classify(
    now: DateTime<Utc>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    lead: Duration,
) -> Classification {
    TimeWindow::new(start, end).classify(now, lead)
}
