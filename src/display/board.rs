//! Display Board
//!
//! Owns one [`Watcher`] per event registration window and one for the menu
//! visibility window. A sync loop follows the store: new data re-targets the
//! watchers (cancelling their pending wake-ups), and watchers for events that
//! disappeared are dropped. The menu window is also rebuilt at local midnight,
//! when yesterday's menus stop counting.

use super::{build_model, menu_window, registration_key, DisplayModel, DisplaySettings, Frame};
use crate::chip::{ChangeSignal, RegistrationWindow, TransitionTimer, Watcher};
use crate::clock::SharedClock;
use crate::poller::DataStore;
use crate::window::{Classification, MenuWindow};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct DisplayBoard {
    store: Arc<DataStore>,
    clock: SharedClock,
    settings: DisplaySettings,
    signal: ChangeSignal,
    registrations: Mutex<HashMap<String, Watcher<RegistrationWindow>>>,
    menu: Watcher<MenuWindow>,
    cancel: CancellationToken,
}

impl DisplayBoard {
    /// Create a board over `store`. Must be called inside a tokio runtime.
    pub fn new(store: Arc<DataStore>, clock: SharedClock, settings: DisplaySettings) -> Arc<Self> {
        let signal = ChangeSignal::new();
        let menu = Watcher::spawn(
            MenuWindow::always_visible(),
            Arc::clone(&clock),
            settings.max_timer,
            Some(signal.clone()),
        );

        Arc::new(Self {
            store,
            clock,
            settings,
            signal,
            registrations: Mutex::new(HashMap::new()),
            menu,
            cancel: CancellationToken::new(),
        })
    }

    /// Start following the store
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let board = Arc::clone(self);
        tokio::spawn(async move { board.run().await })
    }

    /// Stop the sync loop and every watcher
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.menu.stop();
        self.registrations.lock().await.clear();
    }

    pub fn settings(&self) -> &DisplaySettings {
        &self.settings
    }

    pub fn revision(&self) -> u64 {
        self.signal.revision()
    }

    pub fn menu_window(&self) -> MenuWindow {
        self.menu.inputs()
    }

    pub fn menu_visible(&self) -> bool {
        self.menu.state()
    }

    /// Number of live registration watchers
    pub async fn watched_events(&self) -> usize {
        self.registrations.lock().await.len()
    }

    /// Published registration state for one event
    pub async fn registration(&self, subtitle: &str, event_id: &str) -> Option<Classification> {
        self.registrations
            .lock()
            .await
            .get(&registration_key(subtitle, event_id))
            .map(Watcher::state)
    }

    /// Render the current display model
    pub async fn model(&self) -> DisplayModel {
        let registrations: HashMap<String, Classification> = self
            .registrations
            .lock()
            .await
            .iter()
            .map(|(key, watcher)| (key.clone(), watcher.state()))
            .collect();

        let feeds = self.store.events();
        let restaurants = self.store.restaurants();
        let election = self.store.election_enabled().then(|| self.store.election());

        build_model(&Frame {
            now: self.clock.now(),
            revision: self.signal.revision(),
            feeds: &feeds,
            restaurants: &restaurants,
            election: election.as_ref(),
            registrations: &registrations,
            menu_window: self.menu.inputs(),
            menu_visible: self.menu.state(),
            settings: &self.settings,
        })
    }

    /// Wait until the revision differs from `after`, or `timeout` elapses.
    /// Returns the revision at that point.
    ///
    /// A revision lower than `after` counts as a change: the counter starts
    /// over when the server restarts.
    pub async fn wait_for_change(&self, after: u64, timeout: Duration) -> u64 {
        let mut revisions = self.signal.subscribe();
        let _ = tokio::time::timeout(timeout, revisions.wait_for(|revision| *revision != after)).await;
        self.signal.revision()
    }

    async fn run(&self) {
        let mut events = self.store.subscribe_events();
        let mut restaurants = self.store.subscribe_restaurants();
        let mut election = self.store.subscribe_election();

        self.sync_registrations().await;
        self.sync_menu_window();

        let mut day = self.today();
        let mut midnight = TransitionTimer::new(self.settings.max_timer);
        let now = self.clock.now();
        midnight.arm(now, next_local_midnight(now, self.settings.timezone));

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = midnight.fired() => {
                    let today = self.today();
                    if today != day {
                        day = today;
                        tracing::debug!(%day, "Local day changed");
                        self.sync_menu_window();
                        self.signal.bump();
                    }
                    let now = self.clock.now();
                    midnight.arm(now, next_local_midnight(now, self.settings.timezone));
                }
                changed = events.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.sync_registrations().await;
                    self.signal.bump();
                }
                changed = restaurants.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.sync_menu_window();
                    self.signal.bump();
                }
                changed = election.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.signal.bump();
                }
            }
        }

        tracing::debug!("Display board stopped");
    }

    /// Re-target registration watchers at the events now in the store
    async fn sync_registrations(&self) {
        let feeds = self.store.events();
        let mut watchers = self.registrations.lock().await;
        let mut live = HashSet::new();

        for feed in &feeds {
            for event in feed.cached.value.iter().flatten() {
                let inputs = RegistrationWindow {
                    window: event.registration_window(),
                    lead: self.settings.countdown_lead,
                };
                if inputs.window.start.is_none() {
                    continue;
                }

                let key = registration_key(&feed.subtitle, &event.id);
                match watchers.get(&key) {
                    Some(watcher) => {
                        if watcher.update(inputs) {
                            tracing::debug!(event = %key, "Registration window changed");
                        }
                    }
                    None => {
                        let watcher = Watcher::spawn(
                            inputs,
                            Arc::clone(&self.clock),
                            self.settings.max_timer,
                            Some(self.signal.clone()),
                        );
                        watchers.insert(key.clone(), watcher);
                    }
                }
                live.insert(key);
            }
        }

        // dropping a watcher cancels its pending wake-up
        watchers.retain(|key, _| live.contains(key));
        tracing::debug!(watched = watchers.len(), "Registration watchers synced");
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.settings.timezone).date_naive()
    }

    fn sync_menu_window(&self) {
        let window = menu_window(&self.store.restaurants(), self.today(), self.settings.menu_padding);

        if self.menu.update(window) {
            tracing::info!(
                visible_from = ?window.visible_from,
                visible_until = ?window.visible_until,
                "Menu window updated"
            );
        }
    }
}

/// First instant of the next local day
fn next_local_midnight(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    now.with_timezone(&tz)
        .date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| tz.from_local_datetime(&midnight).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or_else(|| now + chrono::Duration::days(1))
}
