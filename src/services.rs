//! Service wiring
//!
//! Builds the sources, store, poller and display board described by a
//! [`Config`].

use crate::clock::SharedClock;
use crate::config::{Config, ConfigError};
use crate::display::DisplayBoard;
use crate::poller::{DataStore, Poller};
use crate::sources::{ElectionSource, EventSource, SourceError, UnicafeSource};
use std::sync::Arc;
use thiserror::Error;

/// Errors building services from configuration
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create source: {0}")]
    Source(#[from] SourceError),
}

/// Everything the server runs
pub struct Services {
    pub store: Arc<DataStore>,
    pub poller: Arc<Poller>,
    pub board: Arc<DisplayBoard>,
}

impl Services {
    /// Wire up every configured source. Must be called inside a tokio
    /// runtime.
    pub fn from_config(config: &Config, clock: SharedClock) -> Result<Self, StartupError> {
        let settings = config.display_settings()?;
        let http = config.sources.http();
        let tz = settings.timezone;

        let feeds: Vec<_> = config
            .sources
            .events
            .iter()
            .filter(|feed| {
                if feed.url.is_empty() {
                    tracing::warn!(feed = %feed.name, "Event feed has no url, skipping");
                    false
                } else {
                    true
                }
            })
            .collect();

        let store = Arc::new(DataStore::new(
            feeds.iter().map(|feed| feed.name.clone()),
            config.sources.restaurants.iter().map(|r| r.slug.clone()),
            config.sources.election.enabled,
        ));

        let mut poller = Poller::new(Arc::clone(&store), Arc::clone(&clock));

        for feed in &feeds {
            let source = EventSource::new(&feed.name, &feed.url, tz, Arc::clone(&clock), &http)?
                .max_events(feed.max_events);
            poller.register(Arc::new(source), Config::poll_interval(&feed.name, feed.interval_minutes)?);
        }

        if !config.sources.restaurants.is_empty() {
            let source = UnicafeSource::new(
                &config.sources.unicafe_url,
                config.sources.restaurants.clone(),
                tz,
                Arc::clone(&clock),
                &http,
            )?;
            poller.register(
                Arc::new(source),
                Config::poll_interval("restaurants_minutes", config.polling.restaurants_minutes)?,
            );
        }

        let election = &config.sources.election;
        if election.enabled {
            let source = ElectionSource::new(
                &election.by_faculty_url,
                &election.by_hour_url,
                &election.faculty,
                &http,
            )?;
            poller.register(
                Arc::new(source),
                Config::poll_interval("election_minutes", config.polling.election_minutes)?,
            );
        }

        let board = DisplayBoard::new(Arc::clone(&store), clock, settings);

        Ok(Self {
            store,
            poller: Arc::new(poller),
            board,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[tokio::test]
    async fn test_default_config_skips_feeds_without_url() {
        let services = Services::from_config(&Config::default(), Arc::new(SystemClock)).unwrap();

        let schedule = services.poller.schedule();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].name, "unicafe");
        assert_eq!(schedule[0].interval_secs, 3600);
        assert!(services.store.events().is_empty());
        assert_eq!(services.store.restaurants().len(), 2);
    }

    #[tokio::test]
    async fn test_configured_feeds_and_election() {
        let mut config = Config::default();
        config.sources.events[0].url = "http://localhost:9/events".to_string();
        config.sources.election.enabled = true;

        let services = Services::from_config(&config, Arc::new(SystemClock)).unwrap();
        let names: Vec<_> = services.poller.schedule().into_iter().map(|s| (s.name, s.interval_secs)).collect();

        assert_eq!(
            names,
            vec![
                ("events:TKO-äly".to_string(), 300),
                ("unicafe".to_string(), 3600),
                ("election".to_string(), 3600),
            ]
        );
        assert_eq!(services.store.events()[0].subtitle, "TKO-äly");
    }

    #[tokio::test]
    async fn test_overflowing_poll_interval_fails() {
        let mut config = Config::default();
        config.polling.restaurants_minutes = u64::MAX;
        assert!(matches!(
            Services::from_config(&config, Arc::new(SystemClock)),
            Err(StartupError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[tokio::test]
    async fn test_bad_timezone_fails() {
        let mut config = Config::default();
        config.windows.timezone = "Nowhere/Land".to_string();
        assert!(matches!(
            Services::from_config(&config, Arc::new(SystemClock)),
            Err(StartupError::Config(_))
        ));
    }
}
