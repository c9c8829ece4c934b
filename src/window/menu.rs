//! Menu visibility window
//!
//! Menus are shown from an hour before the earliest lunch opening until an
//! hour after the latest closing. Restaurants without parseable hours don't
//! constrain the window; with no hours at all the menu is always shown.

use super::Phase;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Lunch serving hours for one restaurant on one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServingHours {
    pub opens: DateTime<Utc>,
    pub closes: DateTime<Utc>,
}

/// Parse an "HH:mm–HH:mm" lunch-hours string for `date` in the restaurant's
/// time zone.
///
/// Accepts an en dash or a hyphen and `.` or `:` as the separator. Returns
/// `None` for anything unparseable or for a closing time before the opening.
pub fn parse_lunch_hours(raw: &str, date: NaiveDate, tz: Tz) -> Option<ServingHours> {
    let re = regex::Regex::new(r"^\s*(\d{1,2})[:.](\d{2})\s*[–—-]\s*(\d{1,2})[:.](\d{2})\s*$").ok()?;
    let caps = re.captures(raw)?;

    let local = |h: &str, m: &str| -> Option<DateTime<Utc>> {
        let time = NaiveTime::from_hms_opt(h.parse().ok()?, m.parse().ok()?, 0)?;
        tz.from_local_datetime(&date.and_time(time))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    };

    let opens = local(&caps[1], &caps[2])?;
    let closes = local(&caps[3], &caps[4])?;
    if closes < opens {
        return None;
    }

    Some(ServingHours { opens, closes })
}

/// Padded visibility span across all restaurants shown on the screen.
///
/// The span is a closed interval: the menu is still visible at exactly
/// `visible_until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MenuWindow {
    pub visible_from: Option<DateTime<Utc>>,
    pub visible_until: Option<DateTime<Utc>>,
}

impl MenuWindow {
    /// No hours known: always visible
    pub fn always_visible() -> Self {
        Self::default()
    }

    /// Earliest opening minus `padding` to latest closing plus `padding`
    pub fn from_hours<'a>(hours: impl IntoIterator<Item = &'a ServingHours>, padding: Duration) -> Self {
        let mut from: Option<DateTime<Utc>> = None;
        let mut until: Option<DateTime<Utc>> = None;

        for h in hours {
            from = Some(from.map_or(h.opens, |f| f.min(h.opens)));
            until = Some(until.map_or(h.closes, |u| u.max(h.closes)));
        }

        match (from, until) {
            (Some(from), Some(until)) => Self {
                visible_from: Some(from - padding),
                visible_until: Some(until + padding),
            },
            _ => Self::always_visible(),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.visible_from.is_some() && self.visible_until.is_some()
    }

    pub fn phase(&self, now: DateTime<Utc>) -> Phase {
        match (self.visible_from, self.visible_until) {
            (Some(from), _) if now < from => Phase::Before,
            (_, Some(until)) if now > until => Phase::After,
            _ => Phase::Active,
        }
    }

    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.phase(now) == Phase::Active
    }

    /// Next instant at which visibility flips
    pub fn next_boundary(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.phase(now) {
            Phase::Before => self.visible_from,
            // closed upper bound: flip on the first instant past it
            Phase::Active => self.visible_until.map(|u| u + Duration::milliseconds(1)),
            Phase::After => None,
        }
    }
}
