//! Shared before/active/after state machine

use serde::{Deserialize, Serialize};

/// Phase of a time-driven window. Ordered: `Before < Active < After`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Before,
    Active,
    After,
}

/// Tracks a phase that only moves forward in time.
///
/// Time-driven observations can only advance it. Replacing the window's
/// inputs goes through [`PhaseTracker::reset`], which adopts whatever phase
/// the new inputs give.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTracker {
    phase: Phase,
}

impl PhaseTracker {
    pub fn new(initial: Phase) -> Self {
        Self { phase: initial }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Record a time-driven observation.
    ///
    /// Returns `false` if the observation lies behind the current phase
    /// (e.g. the wall clock stepped backwards), leaving the phase untouched.
    pub fn advance(&mut self, observed: Phase) -> bool {
        if observed < self.phase {
            return false;
        }
        self.phase = observed;
        true
    }

    /// New inputs: start over from the observed phase
    pub fn reset(&mut self, observed: Phase) {
        self.phase = observed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_is_monotonic() {
        let mut tracker = PhaseTracker::new(Phase::Before);
        assert!(tracker.advance(Phase::Before));
        assert!(tracker.advance(Phase::Active));
        assert!(tracker.advance(Phase::After));
        assert!(!tracker.advance(Phase::Active));
        assert_eq!(tracker.phase(), Phase::After);
    }

    #[test]
    fn test_reset_goes_anywhere() {
        let mut tracker = PhaseTracker::new(Phase::After);
        tracker.reset(Phase::Before);
        assert_eq!(tracker.phase(), Phase::Before);
    }
}
