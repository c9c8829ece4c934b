//! Upstream Data Sources
//!
//! Thin HTTP clients for the providers the screen polls:
//! - Unicafe restaurant menus
//! - Event lists (one source per event provider)
//! - Student-union election turnout
//!
//! Every source reshapes the provider's JSON into our own types. Errors are
//! typed here and swallowed by the poller, which keeps the last good data.

mod election;
mod events;
mod unicafe;

pub use election::{ElectionSource, Turnout};
pub use events::{parse_instant, Event, EventSource};
pub use unicafe::{FoodItem, FoodMeta, MenuGroup, RestaurantMenu, RestaurantRef, UnicafeSource};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Common trait for everything the poller refreshes
#[async_trait]
pub trait Source: Send + Sync {
    /// Unique name, used in logs and for manual refreshes
    fn name(&self) -> &str;

    /// The dataset this source writes
    fn dataset(&self) -> DatasetKey;

    /// Fetch and reshape the upstream data
    async fn fetch(&self) -> Result<Snapshot, SourceError>;
}

/// Identifies a dataset in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatasetKey {
    /// Events under a display subtitle
    Events(String),
    /// All configured restaurants
    Restaurants,
    Election,
}

/// Freshly fetched data, ready to replace what the store holds
#[derive(Debug)]
pub enum Snapshot {
    Events {
        subtitle: String,
        events: Vec<Event>,
    },
    /// Per-restaurant outcomes: a restaurant missing from an otherwise good
    /// response fails on its own
    Restaurants(Vec<(String, Result<RestaurantMenu, SourceError>)>),
    Election(Turnout),
}

/// Errors that can occur while fetching upstream data
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upstream returned status {status}")]
    Status { status: u16 },

    #[error("Request timeout")]
    Timeout,

    #[error("Upstream unavailable")]
    Unavailable,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing data: {0}")]
    Missing(String),
}

impl SourceError {
    /// Classify a transport error
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout
        } else if e.is_connect() {
            SourceError::Unavailable
        } else {
            SourceError::Request(e)
        }
    }
}

/// HTTP settings shared by all sources
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: format!("infoscreen/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpSettings {
    pub fn client(&self) -> Result<reqwest::Client, SourceError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(SourceError::Request)
    }
}

/// GET `url` and decode the JSON body
pub(crate) async fn get_json(client: &reqwest::Client, url: &str) -> Result<serde_json::Value, SourceError> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(SourceError::from_transport)?;

    if !response.status().is_success() {
        return Err(SourceError::Status {
            status: response.status().as_u16(),
        });
    }

    response
        .json()
        .await
        .map_err(|e| SourceError::Parse(e.to_string()))
}
