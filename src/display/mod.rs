//! Display Model
//!
//! Turns the store's datasets and the watchers' window states into what the
//! screen shows:
//! - event rows grouped by provider, each with registration and date chips
//! - a carousel of today's restaurant menus, or a closed placeholder
//! - election turnout
//! - a muted warning for every dataset whose last poll failed
//!
//! [`DisplayBoard`] keeps the watchers in sync with the store and bumps a
//! revision whenever anything on screen changes.

mod board;
mod text;

pub use board::DisplayBoard;
pub use text::render_text;

use crate::chip::{badge_for, date_badge, Badge, ChipColor};
use crate::poller::{Cached, EventFeed, RestaurantSlot};
use crate::sources::{FoodItem, RestaurantMenu, Turnout};
use crate::window::{Classification, MenuWindow, ServingHours};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Category whose entries are announcements rather than food
const NOTICE_CATEGORY: &str = "tiedoitus";

/// Runtime settings for the display
#[derive(Debug, Clone)]
pub struct DisplaySettings {
    /// How long before registration opens the countdown starts
    pub countdown_lead: Duration,
    /// Extra time the menu stays visible around lunch hours
    pub menu_padding: Duration,
    /// Longest single timer sleep
    pub max_timer: std::time::Duration,
    pub timezone: Tz,
    /// Time each restaurant stays on the carousel
    pub carousel_interval: std::time::Duration,
    /// Prefix for restaurant titles, e.g. "Unicafe"
    pub restaurant_prefix: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            countdown_lead: Duration::hours(2),
            menu_padding: Duration::hours(1),
            max_timer: crate::chip::DEFAULT_MAX_DELAY,
            timezone: chrono_tz::Europe::Helsinki,
            carousel_interval: std::time::Duration::from_secs(10),
            restaurant_prefix: "Unicafe".to_string(),
        }
    }
}

/// Everything on the screen at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayModel {
    pub generated_at: DateTime<Utc>,
    /// Bumped whenever displayed state changes
    pub revision: u64,
    pub warnings: Vec<String>,
    pub events: Vec<EventGroupView>,
    pub menu: MenuView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub election: Option<TurnoutView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventGroupView {
    pub subtitle: String,
    pub stale: bool,
    pub events: Vec<EventRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub registration: Classification,
    pub chips: Vec<Badge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MenuView {
    /// Menus rotate on screen
    Carousel {
        active: usize,
        interval_secs: u64,
        show_indicators: bool,
        slides: Vec<RestaurantSlide>,
    },
    /// Outside lunch hours
    Closed {
        visible_from: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantSlide {
    pub slug: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lunch_hours: Option<String>,
    pub stale: bool,
    pub categories: Vec<CategoryView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryView {
    pub title: String,
    pub items: Vec<FoodRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodRow {
    pub name: String,
    pub climate_choice: bool,
    pub chips: Vec<Badge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnoutView {
    pub total: Option<f64>,
    pub faculty_name: String,
    pub faculty: Option<f64>,
    pub stale: bool,
}

/// Inputs for one rendering of the display
pub struct Frame<'a> {
    pub now: DateTime<Utc>,
    pub revision: u64,
    pub feeds: &'a [EventFeed],
    pub restaurants: &'a [RestaurantSlot],
    pub election: Option<&'a Cached<Turnout>>,
    /// Published registration states keyed by [`registration_key`]
    pub registrations: &'a HashMap<String, Classification>,
    pub menu_window: MenuWindow,
    pub menu_visible: bool,
    pub settings: &'a DisplaySettings,
}

/// Key identifying an event's registration watcher
pub fn registration_key(subtitle: &str, event_id: &str) -> String {
    format!("{}/{}", subtitle, event_id)
}

/// Build the display model for a frame
pub fn build_model(frame: &Frame<'_>) -> DisplayModel {
    let mut warnings = Vec::new();
    let tz = frame.settings.timezone;

    let events = frame
        .feeds
        .iter()
        .map(|feed| {
            if feed.cached.is_stale() {
                warnings.push(format!(
                    "Failed to load {} events, this list may be out of date.",
                    feed.subtitle
                ));
            }
            EventGroupView {
                subtitle: feed.subtitle.clone(),
                stale: feed.cached.is_stale(),
                events: event_rows(feed, frame),
            }
        })
        .collect();

    let today = frame.now.with_timezone(&tz).date_naive();
    for slot in frame.restaurants.iter().filter(|s| s.cached.is_stale()) {
        warnings.push(format!(
            "Failed to load the {} menu, it may be out of date.",
            slot.slug
        ));
    }

    let menu = if frame.menu_visible {
        let slides = restaurant_slides(frame.restaurants, today, &frame.settings.restaurant_prefix);
        MenuView::Carousel {
            active: carousel_index(frame.now, frame.settings.carousel_interval, slides.len()),
            interval_secs: frame.settings.carousel_interval.as_secs(),
            show_indicators: slides.len() > 1,
            slides,
        }
    } else {
        MenuView::Closed {
            visible_from: frame.menu_window.next_boundary(frame.now).filter(|_| {
                frame.menu_window.phase(frame.now) == crate::window::Phase::Before
            }),
        }
    };

    let election = frame.election.and_then(|cached| {
        if cached.is_stale() {
            warnings.push("Failed to load election turnout, figures may be out of date.".to_string());
        }
        cached.value.as_ref().map(|turnout| TurnoutView {
            total: turnout.total,
            faculty_name: turnout.faculty_name.clone(),
            faculty: turnout.faculty,
            stale: cached.is_stale(),
        })
    });

    DisplayModel {
        generated_at: frame.now,
        revision: frame.revision,
        warnings,
        events,
        menu,
        election,
    }
}

fn event_rows(feed: &EventFeed, frame: &Frame<'_>) -> Vec<EventRow> {
    let tz = frame.settings.timezone;

    feed.cached
        .value
        .iter()
        .flatten()
        .map(|event| {
            let window = event.registration_window();
            let registration = frame
                .registrations
                .get(&registration_key(&feed.subtitle, &event.id))
                .copied()
                .unwrap_or_else(|| window.classify(frame.now, frame.settings.countdown_lead));

            let mut chips = Vec::with_capacity(2);
            if let Some(badge) = badge_for(registration, &window, frame.now, tz) {
                chips.push(badge);
            }
            chips.push(date_badge(event.starts, frame.now, tz));

            EventRow {
                id: event.id.clone(),
                title: event.title.clone(),
                location: event.location.clone(),
                registration,
                chips,
            }
        })
        .collect()
}

/// Today's menus that actually have food on them
fn todays_menus(slots: &[RestaurantSlot], today: NaiveDate) -> impl Iterator<Item = (&RestaurantSlot, &RestaurantMenu)> {
    slots.iter().filter_map(move |slot| {
        slot.cached
            .value
            .as_ref()
            .filter(|menu| menu.date == today && menu.has_food())
            .map(|menu| (slot, menu))
    })
}

/// Padded visibility window over today's menus
pub fn menu_window(slots: &[RestaurantSlot], today: NaiveDate, padding: Duration) -> MenuWindow {
    let hours: Vec<ServingHours> = todays_menus(slots, today)
        .filter_map(|(_, menu)| menu.serving_hours())
        .collect();
    MenuWindow::from_hours(&hours, padding)
}

fn restaurant_slides(slots: &[RestaurantSlot], today: NaiveDate, prefix: &str) -> Vec<RestaurantSlide> {
    todays_menus(slots, today)
        .map(|(slot, menu)| RestaurantSlide {
            slug: menu.slug.clone(),
            title: format!("{} {}", prefix, menu.name).trim().to_string(),
            lunch_hours: menu.lunch_hours.clone(),
            stale: slot.cached.is_stale(),
            categories: menu
                .groups
                .iter()
                .filter(|group| !group.items.is_empty())
                .map(|group| CategoryView {
                    title: category_title(&group.name),
                    items: group
                        .items
                        .iter()
                        .map(|item| food_row(item, group.name != NOTICE_CATEGORY))
                        .collect(),
                })
                .collect(),
        })
        .collect()
}

fn food_row(item: &FoodItem, with_meta: bool) -> FoodRow {
    let chips = if with_meta {
        item.meta
            .diet
            .iter()
            .map(|tag| Badge::tag(tag.as_str(), ChipColor::Secondary))
            .chain(
                item.meta
                    .allergies
                    .iter()
                    .map(|tag| Badge::tag(tag.as_str(), ChipColor::Default)),
            )
            .collect()
    } else {
        Vec::new()
    };

    FoodRow {
        name: item.name.clone(),
        climate_choice: with_meta && item.meta.climate_choice,
        chips,
    }
}

/// Category headings are shown upper-case without the restaurant name
pub fn category_title(name: &str) -> String {
    name.to_uppercase().replace("KAIVOPIHA", "").trim().to_string()
}

/// Which carousel slide is showing at `now`
pub fn carousel_index(now: DateTime<Utc>, interval: std::time::Duration, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let step = interval.as_millis().max(1) as i64;
    let ticks = now.timestamp_millis().div_euclid(step);
    (ticks as usize) % len
}
