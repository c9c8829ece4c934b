//! Event Routes
//!
//! - GET /api/events/upcoming - Upcoming events keyed by provider subtitle

use axum::{extract::State, Json};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::state::AppState;
use crate::sources::Event;

/// GET /api/events/upcoming
///
/// Providers that have never loaded map to an empty list.
pub async fn upcoming(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, Vec<Event>>> {
    let events = state
        .store
        .events()
        .into_iter()
        .map(|feed| (feed.subtitle, feed.cached.value.unwrap_or_default()))
        .collect();

    Json(events)
}
