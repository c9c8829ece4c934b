//! # Infoscreen
//!
//! Backend for a lobby information screen: polls event lists, campus
//! restaurant menus and election turnout, and derives the time-sensitive
//! state the screen shows from them.
//!
//! ## Features
//!
//! - **Background polling**: every source on its own interval, failures keep
//!   the last good data
//! - **Self-updating chips**: registration badges flip exactly at their
//!   boundaries, with one pending wake-up per window
//! - **Menu window**: menus appear an hour before lunch and disappear an hour
//!   after, across all restaurants
//! - **REST API**: the shaped data and a full display model, with long-polling
//!
//! ## Modules
//!
//! - [`window`]: Time-window classification and the menu visibility window
//! - [`chip`]: Badges, transition timers and window watchers
//! - [`sources`]: Upstream HTTP clients
//! - [`poller`]: Background poller and the data store
//! - [`display`]: Display model and text rendering
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use infoscreen::{Config, Services, SystemClock};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let services = Services::from_config(&config, Arc::new(SystemClock))?;
//!
//!     services.poller.refresh_all().await;
//!     let model = services.board.model().await;
//!     println!("{} warnings", model.warnings.len());
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod chip;
pub mod clock;
pub mod config;
pub mod display;
pub mod poller;
pub mod services;
pub mod sources;
pub mod window;

// Re-export top-level types for convenience
pub use window::{classify, Classification, MenuWindow, Phase, PhaseTracker, ServingHours, TimeWindow};

pub use chip::{badge_for, date_badge, registration_badge, Badge, BadgeKind, ChipColor, TransitionTimer, Watcher};

pub use clock::{Clock, SharedClock, SystemClock, TokioClock};

pub use sources::{
    ElectionSource, Event, EventSource, RestaurantMenu, RestaurantRef, Source, SourceError, Turnout,
    UnicafeSource,
};

pub use poller::{Cached, DataStore, Poller, PollerError};

pub use display::{render_text, DisplayBoard, DisplayModel, DisplaySettings};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig};

pub use services::{Services, StartupError};
