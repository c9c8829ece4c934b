//! Display Routes
//!
//! - GET /api/display - Everything on screen, as JSON or `?format=text`
//! - GET /api/display/changes - Long-poll until the display changes

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use std::time::Duration;

use crate::api::dto::{ChangesQuery, ChangesResponse, DisplayQuery};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::display::render_text;

/// GET /api/display
pub async fn get_display(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DisplayQuery>,
) -> ApiResult<Response> {
    let model = state.board.model().await;

    match query.format.as_deref() {
        None | Some("json") => Ok(Json(model).into_response()),
        Some("text") => {
            let text = render_text(&model, state.board.settings().timezone);
            Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response())
        }
        Some(other) => Err(ApiError::Validation(format!(
            "unknown format {:?}, expected json or text",
            other
        ))),
    }
}

/// GET /api/display/changes?after=N
///
/// Returns as soon as the revision differs from `after`, or when the wait
/// times out with the revision unchanged.
pub async fn wait_for_change(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChangesQuery>,
) -> Json<ChangesResponse> {
    let timeout = query
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(state.long_poll)
        .min(state.long_poll);

    let revision = state.board.wait_for_change(query.after, timeout).await;

    Json(ChangesResponse {
        revision,
        changed: revision != query.after,
    })
}
