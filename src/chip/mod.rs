//! Status Chips
//!
//! Small badges shown next to events and food items:
//! - registration badges derived from a [`TimeWindow`] classification
//! - date badges for event start times
//! - tag badges for diets and allergies
//!
//! [`Watcher`] keeps a badge's classification current by arming a single
//! [`TransitionTimer`] at the next boundary.

mod timer;
mod watcher;

pub use timer::{TransitionTimer, DEFAULT_MAX_DELAY};
pub use watcher::{ChangeSignal, RegistrationWindow, Transitions, Watcher};

use crate::window::{Classification, TimeWindow};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Prefix used on every registration badge
pub const REGISTRATION_MARK: &str = "📝";

/// Badge colour, mapped onto the display's palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipColor {
    Default,
    Secondary,
    Info,
    Success,
    Warning,
    Error,
}

/// What a badge conveys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeKind {
    /// Registration opens soon, ticking down
    Countdown,
    /// Registration open and closing today
    Urgent,
    /// Registration open
    Success,
    /// Registration opens later
    Info,
    /// Event start date/time
    Date,
    /// Diet or allergy tag
    Tag,
}

/// A rendered chip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub kind: BadgeKind,
    pub color: ChipColor,
    pub label: String,
    /// For countdown badges: the instant being counted down to, so a client
    /// can keep ticking between refreshes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts_down_to: Option<DateTime<Utc>>,
}

impl Badge {
    pub fn new(kind: BadgeKind, color: ChipColor, label: impl Into<String>) -> Self {
        Self {
            kind,
            color,
            label: label.into(),
            counts_down_to: None,
        }
    }

    pub fn tag(label: impl Into<String>, color: ChipColor) -> Self {
        Self::new(BadgeKind::Tag, color, label)
    }
}

/// Registration badge for `window` at `now`
pub fn registration_badge(window: &TimeWindow, now: DateTime<Utc>, lead: Duration, tz: Tz) -> Option<Badge> {
    badge_for(window.classify(now, lead), window, now, tz)
}

/// Registration badge for an already computed classification.
///
/// The watcher publishes classifications; labels that depend on `now`
/// (countdowns) are filled in at render time.
pub fn badge_for(
    classification: Classification,
    window: &TimeWindow,
    now: DateTime<Utc>,
    tz: Tz,
) -> Option<Badge> {
    match classification {
        Classification::NoWindow | Classification::Closed => None,
        Classification::Countdown => {
            let start = window.start?;
            let mut badge = Badge::new(
                BadgeKind::Countdown,
                ChipColor::Warning,
                format!("{} {}", REGISTRATION_MARK, countdown_label(start, now)),
            );
            badge.counts_down_to = Some(start);
            Some(badge)
        }
        Classification::Open => match window.end {
            Some(end) if same_local_day(end, now, tz) => Some(Badge::new(
                BadgeKind::Urgent,
                ChipColor::Error,
                format!("{} {}", REGISTRATION_MARK, end.with_timezone(&tz).format("%H:%M")),
            )),
            _ => Some(Badge::new(BadgeKind::Success, ChipColor::Success, REGISTRATION_MARK)),
        },
        Classification::Upcoming => {
            let start = window.start?;
            Some(Badge::new(
                BadgeKind::Info,
                ChipColor::Info,
                format!("{} {}", REGISTRATION_MARK, start.with_timezone(&tz).format("%d.%m. %H:%M")),
            ))
        }
    }
}

/// Remaining time until `until` as `HH:MM:SS`, saturating at zero
pub fn countdown_label(until: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = (until - now).num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        remaining / 3600,
        (remaining % 3600) / 60,
        remaining % 60
    )
}

/// Date badge for an event starting at `start`.
///
/// Today or tomorrow shows the time only, later this week the weekday and
/// time, anything else the date. Weeks start on Sunday.
pub fn date_badge(start: DateTime<Utc>, now: DateTime<Utc>, tz: Tz) -> Badge {
    let local_start = start.with_timezone(&tz);
    let local_now = now.with_timezone(&tz);
    let days_ahead = (local_start.date_naive() - local_now.date_naive()).num_days();

    let label = if days_ahead == 0 || days_ahead == 1 {
        local_start.format("%H:%M").to_string()
    } else if week_start(local_start.date_naive()) == week_start(local_now.date_naive()) {
        local_start.format("%A %H:%M").to_string()
    } else {
        local_start.format("%d.%m.").to_string()
    };

    Badge::new(BadgeKind::Date, ChipColor::Default, label)
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

fn same_local_day(a: DateTime<Utc>, b: DateTime<Utc>, tz: Tz) -> bool {
    a.with_timezone(&tz).date_naive() == b.with_timezone(&tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Helsinki;

    // Helsinki local time on Monday 2024-03-04 (UTC+2)
    fn local(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Helsinki
            .with_ymd_and_hms(2024, 3, day, h, m, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn lead() -> Duration {
        Duration::hours(2)
    }

    #[test]
    fn test_countdown_badge() {
        let window = TimeWindow::new(Some(local(4, 14, 0)), Some(local(4, 16, 0)));
        let badge = registration_badge(&window, local(4, 12, 30), lead(), Helsinki).unwrap();

        assert_eq!(badge.kind, BadgeKind::Countdown);
        assert_eq!(badge.color, ChipColor::Warning);
        assert_eq!(badge.label, "📝 01:30:00");
        assert_eq!(badge.counts_down_to, Some(local(4, 14, 0)));
    }

    #[test]
    fn test_example_day() {
        let window = TimeWindow::new(Some(local(4, 14, 0)), Some(local(4, 16, 0)));

        let at_start = registration_badge(&window, local(4, 14, 0), lead(), Helsinki).unwrap();
        assert_eq!(at_start.kind, BadgeKind::Urgent);

        let before_end = registration_badge(&window, local(4, 15, 59), lead(), Helsinki).unwrap();
        assert_eq!(before_end.kind, BadgeKind::Urgent);
        assert_eq!(before_end.color, ChipColor::Error);
        assert_eq!(before_end.label, "📝 16:00");

        assert!(registration_badge(&window, local(4, 16, 0), lead(), Helsinki).is_none());
    }

    #[test]
    fn test_open_closing_later_is_success() {
        let window = TimeWindow::new(Some(local(4, 14, 0)), Some(local(6, 16, 0)));
        let badge = registration_badge(&window, local(4, 15, 0), lead(), Helsinki).unwrap();
        assert_eq!(badge.kind, BadgeKind::Success);
        assert_eq!(badge.label, "📝");

        let open_ended = TimeWindow::open_ended(local(4, 14, 0));
        let badge = registration_badge(&open_ended, local(4, 15, 0), lead(), Helsinki).unwrap();
        assert_eq!(badge.kind, BadgeKind::Success);
    }

    #[test]
    fn test_upcoming_badge_shows_start() {
        let window = TimeWindow::new(Some(local(7, 12, 0)), Some(local(8, 12, 0)));
        let badge = registration_badge(&window, local(4, 9, 0), lead(), Helsinki).unwrap();
        assert_eq!(badge.kind, BadgeKind::Info);
        assert_eq!(badge.label, "📝 07.03. 12:00");
    }

    #[test]
    fn test_no_window_renders_nothing() {
        assert!(registration_badge(&TimeWindow::default(), local(4, 9, 0), lead(), Helsinki).is_none());
    }

    #[test]
    fn test_countdown_label_saturates() {
        assert_eq!(countdown_label(local(4, 10, 0), local(4, 11, 0)), "00:00:00");
        assert_eq!(countdown_label(local(4, 11, 0), local(4, 10, 58)), "00:02:00");
    }

    #[test]
    fn test_date_badges() {
        let now = local(4, 9, 0);
        assert_eq!(date_badge(local(4, 18, 0), now, Helsinki).label, "18:00");
        assert_eq!(date_badge(local(5, 18, 15), now, Helsinki).label, "18:15");
        assert_eq!(date_badge(local(7, 19, 0), now, Helsinki).label, "Thursday 19:00");
        assert_eq!(date_badge(local(12, 19, 0), now, Helsinki).label, "12.03.");
    }

    #[test]
    fn test_date_badge_weeks_start_on_sunday() {
        // Sunday 10.03. starts a new week
        let monday = local(4, 9, 0);
        assert_eq!(date_badge(local(10, 12, 0), monday, Helsinki).label, "10.03.");

        let sunday = local(10, 9, 0);
        assert_eq!(date_badge(local(13, 19, 0), sunday, Helsinki).label, "Wednesday 19:00");
        assert_eq!(date_badge(local(16, 19, 0), sunday, Helsinki).label, "Saturday 19:00");
        assert_eq!(date_badge(local(17, 19, 0), sunday, Helsinki).label, "17.03.");
    }
}
