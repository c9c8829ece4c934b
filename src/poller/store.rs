//! Data Store
//!
//! In-memory copy of the last good data for every dataset, plus the outcome
//! of the most recent poll. Each dataset sits behind a `watch` channel so
//! dependants (the display board) wake up when it is replaced.

use crate::sources::{DatasetKey, Event, RestaurantMenu, Snapshot, SourceError, Turnout};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tokio::sync::watch;

/// Last good value of a dataset and the state of its polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cached<T> {
    pub value: Option<T>,
    /// When `value` was fetched
    pub fetched_at: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    /// Error from the most recent poll, cleared by the next success
    pub last_error: Option<String>,
    /// Consecutive failed polls
    pub failures: u32,
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self {
            value: None,
            fetched_at: None,
            last_attempt: None,
            last_error: None,
            failures: 0,
        }
    }
}

impl<T> Cached<T> {
    pub fn succeed(&mut self, value: T, at: DateTime<Utc>) {
        self.value = Some(value);
        self.fetched_at = Some(at);
        self.last_attempt = Some(at);
        self.last_error = None;
        self.failures = 0;
    }

    /// Record a failed poll, keeping the last good value
    pub fn fail(&mut self, error: impl Display, at: DateTime<Utc>) {
        self.last_attempt = Some(at);
        self.last_error = Some(error.to_string());
        self.failures += 1;
    }

    /// The most recent poll failed; `value` may be out of date
    pub fn is_stale(&self) -> bool {
        self.last_error.is_some()
    }

    /// At least one poll has completed, successfully or not
    pub fn is_settled(&self) -> bool {
        self.last_attempt.is_some()
    }
}

/// Events from one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFeed {
    pub subtitle: String,
    pub cached: Cached<Vec<Event>>,
}

/// Today's menu for one restaurant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantSlot {
    pub slug: String,
    pub cached: Cached<RestaurantMenu>,
}

/// Shared store of everything the poller fetched
pub struct DataStore {
    events: watch::Sender<Vec<EventFeed>>,
    restaurants: watch::Sender<Vec<RestaurantSlot>>,
    election: watch::Sender<Cached<Turnout>>,
    election_enabled: bool,
}

impl DataStore {
    /// Create a store with empty slots for the configured feeds, in display
    /// order
    pub fn new<S, R>(subtitles: S, slugs: R, election_enabled: bool) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        let feeds = subtitles
            .into_iter()
            .map(|s| EventFeed {
                subtitle: s.into(),
                cached: Cached::default(),
            })
            .collect();
        let slots = slugs
            .into_iter()
            .map(|s| RestaurantSlot {
                slug: s.into(),
                cached: Cached::default(),
            })
            .collect();

        Self {
            events: watch::channel(feeds).0,
            restaurants: watch::channel(slots).0,
            election: watch::channel(Cached::default()).0,
            election_enabled,
        }
    }

    /// Replace a dataset with freshly fetched data
    pub fn apply(&self, snapshot: Snapshot, at: DateTime<Utc>) {
        match snapshot {
            Snapshot::Events { subtitle, events } => {
                self.events.send_modify(|feeds| {
                    feed_mut(feeds, &subtitle).cached.succeed(events, at);
                });
            }
            Snapshot::Restaurants(outcomes) => {
                self.restaurants.send_modify(|slots| {
                    for (slug, outcome) in outcomes {
                        let slot = slot_mut(slots, &slug);
                        match outcome {
                            Ok(menu) => slot.cached.succeed(menu, at),
                            Err(e) => {
                                tracing::warn!(restaurant = %slug, error = %e, "Restaurant menu unavailable");
                                slot.cached.fail(e, at);
                            }
                        }
                    }
                });
            }
            Snapshot::Election(turnout) => {
                self.election.send_modify(|cached| cached.succeed(turnout, at));
            }
        }
    }

    /// Record a failed poll for a whole dataset
    pub fn record_failure(&self, key: &DatasetKey, error: &SourceError, at: DateTime<Utc>) {
        match key {
            DatasetKey::Events(subtitle) => {
                self.events
                    .send_modify(|feeds| feed_mut(feeds, subtitle).cached.fail(error, at));
            }
            DatasetKey::Restaurants => {
                self.restaurants.send_modify(|slots| {
                    for slot in slots.iter_mut() {
                        slot.cached.fail(error, at);
                    }
                });
            }
            DatasetKey::Election => {
                self.election.send_modify(|cached| cached.fail(error, at));
            }
        }
    }

    pub fn events(&self) -> Vec<EventFeed> {
        self.events.borrow().clone()
    }

    pub fn restaurants(&self) -> Vec<RestaurantSlot> {
        self.restaurants.borrow().clone()
    }

    pub fn restaurant(&self, slug: &str) -> Option<RestaurantSlot> {
        self.restaurants
            .borrow()
            .iter()
            .find(|s| s.slug == slug)
            .cloned()
    }

    pub fn election(&self) -> Cached<Turnout> {
        self.election.borrow().clone()
    }

    pub fn election_enabled(&self) -> bool {
        self.election_enabled
    }

    pub fn subscribe_events(&self) -> watch::Receiver<Vec<EventFeed>> {
        self.events.subscribe()
    }

    pub fn subscribe_restaurants(&self) -> watch::Receiver<Vec<RestaurantSlot>> {
        self.restaurants.subscribe()
    }

    pub fn subscribe_election(&self) -> watch::Receiver<Cached<Turnout>> {
        self.election.subscribe()
    }

    /// Every dataset has been polled at least once
    pub fn is_ready(&self) -> bool {
        let events_ready = self.events.borrow().iter().all(|f| f.cached.is_settled());
        let restaurants_ready = self
            .restaurants
            .borrow()
            .iter()
            .all(|s| s.cached.is_settled());
        let election_ready = !self.election_enabled || self.election.borrow().is_settled();

        events_ready && restaurants_ready && election_ready
    }
}

fn feed_mut<'a>(feeds: &'a mut Vec<EventFeed>, subtitle: &str) -> &'a mut EventFeed {
    match feeds.iter().position(|f| f.subtitle == subtitle) {
        Some(index) => &mut feeds[index],
        None => {
            feeds.push(EventFeed {
                subtitle: subtitle.to_string(),
                cached: Cached::default(),
            });
            let last = feeds.len() - 1;
            &mut feeds[last]
        }
    }
}

fn slot_mut<'a>(slots: &'a mut Vec<RestaurantSlot>, slug: &str) -> &'a mut RestaurantSlot {
    match slots.iter().position(|s| s.slug == slug) {
        Some(index) => &mut slots[index],
        None => {
            slots.push(RestaurantSlot {
                slug: slug.to_string(),
                cached: Cached::default(),
            });
            let last = slots.len() - 1;
            &mut slots[last]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, 0, 0).unwrap()
    }

    fn event(id: &str) -> Event {
        Event {
            id: id.to_string(),
            title: format!("Event {}", id),
            starts: at(18),
            registration_starts: None,
            registration_ends: None,
            location: None,
        }
    }

    fn menu(slug: &str) -> RestaurantMenu {
        RestaurantMenu {
            slug: slug.to_string(),
            name: slug.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            lunch_hours: None,
            opening_hour: None,
            closing_hour: None,
            groups: Vec::new(),
        }
    }

    #[test]
    fn test_failure_keeps_last_good_value() {
        let store = DataStore::new(["TKO-äly"], Vec::<String>::new(), false);
        store.apply(
            Snapshot::Events {
                subtitle: "TKO-äly".to_string(),
                events: vec![event("1")],
            },
            at(10),
        );
        store.record_failure(&DatasetKey::Events("TKO-äly".to_string()), &SourceError::Timeout, at(11));

        let feeds = store.events();
        let cached = &feeds[0].cached;
        assert_eq!(cached.value.as_ref().map(Vec::len), Some(1));
        assert_eq!(cached.fetched_at, Some(at(10)));
        assert_eq!(cached.last_attempt, Some(at(11)));
        assert!(cached.is_stale());
        assert_eq!(cached.failures, 1);
    }

    #[test]
    fn test_success_clears_error() {
        let mut cached: Cached<u32> = Cached::default();
        cached.fail("boom", at(9));
        cached.fail("boom", at(10));
        assert_eq!(cached.failures, 2);
        cached.succeed(7, at(11));
        assert!(!cached.is_stale());
        assert_eq!(cached.failures, 0);
    }

    #[test]
    fn test_restaurant_outcomes_are_independent() {
        let store = DataStore::new(Vec::<String>::new(), ["exactum", "chemicum"], false);
        store.apply(
            Snapshot::Restaurants(vec![
                ("exactum".to_string(), Ok(menu("exactum"))),
                ("chemicum".to_string(), Err(SourceError::Missing("gone".to_string()))),
            ]),
            at(10),
        );

        assert!(store.restaurant("exactum").unwrap().cached.value.is_some());
        let chemicum = store.restaurant("chemicum").unwrap();
        assert!(chemicum.cached.value.is_none());
        assert!(chemicum.cached.is_stale());
        assert!(store.restaurant("kaivopiha").is_none());
    }

    #[test]
    fn test_readiness() {
        let store = DataStore::new(["A"], ["exactum"], true);
        assert!(!store.is_ready());

        store.record_failure(&DatasetKey::Events("A".to_string()), &SourceError::Unavailable, at(10));
        store.record_failure(&DatasetKey::Restaurants, &SourceError::Unavailable, at(10));
        assert!(!store.is_ready());

        store.apply(
            Snapshot::Election(Turnout {
                total: Some(30.0),
                faculty_name: "X".to_string(),
                faculty: None,
            }),
            at(10),
        );
        assert!(store.is_ready());
    }

    #[tokio::test]
    async fn test_subscribers_are_notified() {
        let store = DataStore::new(["A"], Vec::<String>::new(), false);
        let mut rx = store.subscribe_events();
        store.apply(
            Snapshot::Events {
                subtitle: "A".to_string(),
                events: vec![event("1")],
            },
            at(10),
        );
        assert!(rx.has_changed().unwrap());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
    }
}
