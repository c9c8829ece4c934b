//! Source Routes
//!
//! Polling status and manual refreshes.
//!
//! - GET /api/sources - Poll schedule and per-dataset status
//! - POST /api/sources/:name/refresh - Poll one source now

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{DatasetStatus, RefreshResponse, ScheduleEntry, SourcesResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::poller::DataStore;

/// GET /api/sources
pub async fn list_sources(State(state): State<Arc<AppState>>) -> Json<SourcesResponse> {
    let schedule = state
        .poller
        .schedule()
        .into_iter()
        .map(|s| ScheduleEntry {
            name: s.name,
            interval_secs: s.interval_secs,
        })
        .collect();

    Json(SourcesResponse {
        poller_running: state.poller.is_running().await,
        schedule,
        datasets: dataset_statuses(&state.store),
    })
}

/// POST /api/sources/:name/refresh
///
/// Unknown sources are 404; an upstream failure is 502 and is recorded on
/// the dataset just like a scheduled poll.
pub async fn refresh_source(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<RefreshResponse>> {
    state.poller.refresh(&name).await?;
    tracing::info!(source = %name, "Manual refresh completed");

    Ok(Json(RefreshResponse {
        source: name,
        status: "ok".to_string(),
    }))
}

/// Status of every dataset in the store, in display order
pub fn dataset_statuses(store: &DataStore) -> Vec<DatasetStatus> {
    let mut datasets: Vec<DatasetStatus> = store
        .events()
        .iter()
        .map(|feed| DatasetStatus::of(format!("events:{}", feed.subtitle), &feed.cached))
        .collect();

    datasets.extend(
        store
            .restaurants()
            .iter()
            .map(|slot| DatasetStatus::of(format!("restaurant:{}", slot.slug), &slot.cached)),
    );

    if store.election_enabled() {
        datasets.push(DatasetStatus::of("election", &store.election()));
    }

    datasets
}
