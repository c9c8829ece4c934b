//! Election Routes
//!
//! - GET /api/election - Current turnout

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::sources::Turnout;

/// GET /api/election
pub async fn turnout(State(state): State<Arc<AppState>>) -> ApiResult<Json<Turnout>> {
    if !state.store.election_enabled() {
        return Err(ApiError::NotFound("election turnout is disabled".to_string()));
    }

    state
        .store
        .election()
        .value
        .map(Json)
        .ok_or_else(|| ApiError::Unavailable("turnout not loaded".to_string()))
}
