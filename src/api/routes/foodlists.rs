//! Food List Routes
//!
//! - GET /api/foodlists/:restaurant - Today's shaped menu for one restaurant

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::sources::RestaurantMenu;

/// GET /api/foodlists/:restaurant
pub async fn get_foodlist(
    State(state): State<Arc<AppState>>,
    Path(restaurant): Path<String>,
) -> ApiResult<Json<RestaurantMenu>> {
    let slot = state
        .store
        .restaurant(&restaurant)
        .ok_or_else(|| ApiError::NotFound(format!("restaurant {}", restaurant)))?;

    let menu = slot.cached.value.ok_or_else(|| {
        ApiError::Unavailable(format!(
            "menu for {} not loaded: {}",
            restaurant,
            slot.cached.last_error.as_deref().unwrap_or("not polled yet")
        ))
    })?;

    Ok(Json(menu))
}
