//! Infoscreen REST API
//!
//! HTTP API layer serving the display and the data behind it, built with
//! Axum.
//!
//! # Endpoints
//!
//! ## Data
//! - `GET /api/events/upcoming` - Upcoming events keyed by provider
//! - `GET /api/foodlists/:restaurant` - Today's menu for a restaurant
//! - `GET /api/election` - Election turnout
//!
//! ## Display
//! - `GET /api/display` - Full display model (`?format=text` for plain text)
//! - `GET /api/display/changes?after=N` - Long-poll for the next revision
//!
//! ## Sources
//! - `GET /api/sources` - Poll schedule and dataset status
//! - `POST /api/sources/:name/refresh` - Poll one source now
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use crate::config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/events/upcoming", get(routes::events::upcoming))
        .route("/foodlists/:restaurant", get(routes::foodlists::get_foodlist))
        .route("/election", get(routes::election::turnout))
        .route("/display", get(routes::display::get_display))
        .route("/display/changes", get(routes::display::wait_for_change))
        .route("/sources", get(routes::sources::list_sources))
        .route("/sources/:name/refresh", post(routes::sources::refresh_source));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let cors = cors_layer(&state.config.cors_origins);
    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server, returning once a shutdown signal arrives
pub async fn serve(state: AppState) -> Result<(), ApiError> {
    let addr = state.config.addr();
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Infoscreen API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Infoscreen API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::{ChangesResponse, HealthResponse, SourcesResponse};
    use crate::api::error::ErrorResponse;
    use crate::clock::SystemClock;
    use crate::display::{DisplayBoard, DisplayModel, DisplaySettings};
    use crate::poller::{DataStore, Poller};
    use crate::sources::{
        DatasetKey, Event, FoodItem, FoodMeta, MenuGroup, RestaurantMenu, Snapshot, Source, SourceError,
    };
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use chrono::{Duration, Utc};
    use tower::util::ServiceExt;

    /// Always returns one event starting tomorrow
    struct StubEvents;

    #[async_trait]
    impl Source for StubEvents {
        fn name(&self) -> &str {
            "events:TKO-äly"
        }

        fn dataset(&self) -> DatasetKey {
            DatasetKey::Events("TKO-äly".to_string())
        }

        async fn fetch(&self) -> Result<Snapshot, SourceError> {
            Ok(Snapshot::Events {
                subtitle: "TKO-äly".to_string(),
                events: vec![Event {
                    id: "42".to_string(),
                    title: "Vuosijuhlat".to_string(),
                    starts: Utc::now() + Duration::days(1),
                    registration_starts: None,
                    registration_ends: None,
                    location: None,
                }],
            })
        }
    }

    struct DownSource;

    #[async_trait]
    impl Source for DownSource {
        fn name(&self) -> &str {
            "election"
        }

        fn dataset(&self) -> DatasetKey {
            DatasetKey::Election
        }

        async fn fetch(&self) -> Result<Snapshot, SourceError> {
            Err(SourceError::Status { status: 503 })
        }
    }

    fn menu() -> RestaurantMenu {
        RestaurantMenu {
            slug: "chemicum".to_string(),
            name: "Chemicum".to_string(),
            date: Utc::now().date_naive(),
            lunch_hours: Some("10:30–14:00".to_string()),
            opening_hour: None,
            closing_hour: None,
            groups: vec![MenuGroup {
                name: "edullisesti".to_string(),
                items: vec![FoodItem {
                    name: "Soup".to_string(),
                    price_name: "Edullisesti".to_string(),
                    prices: serde_json::Value::Null,
                    meta: FoodMeta::default(),
                }],
            }],
        }
    }

    fn create_test_app() -> (Router, AppState) {
        let store = Arc::new(DataStore::new(["TKO-äly"], ["exactum", "chemicum"], true));
        let clock = Arc::new(SystemClock);
        let mut poller = Poller::new(Arc::clone(&store), clock.clone());
        poller.register(Arc::new(StubEvents), std::time::Duration::from_secs(300));
        poller.register(Arc::new(DownSource), std::time::Duration::from_secs(3600));

        let board = DisplayBoard::new(Arc::clone(&store), clock, DisplaySettings::default());
        let state = AppState::new(Arc::new(poller), board, ApiConfig::default())
            .with_long_poll(std::time::Duration::from_millis(50));

        (build_router(state.clone()), state)
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_live() {
        let (app, _state) = create_test_app();
        assert_eq!(get(app, "/health/live").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_after_first_polls() {
        let (app, state) = create_test_app();
        assert_eq!(
            get(app.clone(), "/health/ready").await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.poller.refresh_all().await;
        state
            .store
            .record_failure(&DatasetKey::Restaurants, &SourceError::Timeout, Utc::now());

        assert_eq!(get(app.clone(), "/health/ready").await.status(), StatusCode::OK);

        let health: HealthResponse = body_json(get(app, "/health").await).await;
        assert_eq!(health.status, "degraded");
        assert_eq!(health.poller, "stopped");
    }

    #[tokio::test]
    async fn test_upcoming_events() {
        let (app, state) = create_test_app();
        state.poller.refresh("events:TKO-äly").await.unwrap();

        let response = get(app, "/api/events/upcoming").await;
        assert_eq!(response.status(), StatusCode::OK);

        let events: std::collections::BTreeMap<String, Vec<Event>> = body_json(response).await;
        assert_eq!(events["TKO-äly"][0].title, "Vuosijuhlat");
    }

    #[tokio::test]
    async fn test_foodlists() {
        let (app, state) = create_test_app();
        state.store.apply(
            Snapshot::Restaurants(vec![
                ("chemicum".to_string(), Ok(menu())),
                ("exactum".to_string(), Err(SourceError::Missing("exactum".to_string()))),
            ]),
            Utc::now(),
        );

        let response = get(app.clone(), "/api/foodlists/chemicum").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = body_json(response).await;
        assert!(body["groups"].is_object());
        let menu: RestaurantMenu = serde_json::from_value(body).unwrap();
        assert_eq!(menu.groups[0].items[0].name, "Soup");

        let response = get(app.clone(), "/api/foodlists/exactum").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let error: ErrorResponse = body_json(response).await;
        assert_eq!(error.error.code, "DATA_UNAVAILABLE");

        let response = get(app, "/api/foodlists/kaivopiha").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_election_unavailable_before_load() {
        let (app, _state) = create_test_app();
        assert_eq!(
            get(app, "/api/election").await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_display_json_and_text() {
        let (app, state) = create_test_app();
        state.poller.refresh("events:TKO-äly").await.unwrap();

        let model: DisplayModel = body_json(get(app.clone(), "/api/display").await).await;
        assert_eq!(model.events[0].events[0].title, "Vuosijuhlat");

        let response = get(app.clone(), "/api/display?format=text").await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("== TKO-äly =="));

        let response = get(app, "/api/display?format=xml").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_display_changes_times_out() {
        let (app, state) = create_test_app();
        let revision = state.board.revision();

        let changes: ChangesResponse = body_json(
            get(app, &format!("/api/display/changes?after={}", revision)).await,
        )
        .await;
        assert!(!changes.changed);
        assert_eq!(changes.revision, revision);
    }

    #[tokio::test]
    async fn test_display_changes_after_server_restart() {
        let (app, state) = create_test_app();
        let revision = state.board.revision();

        // a client still holding a revision from before the restart
        let changes: ChangesResponse = body_json(
            get(app, &format!("/api/display/changes?after={}", revision + 500)).await,
        )
        .await;
        assert!(changes.changed);
        assert_eq!(changes.revision, revision);
    }

    #[tokio::test]
    async fn test_refresh_source() {
        let (app, _state) = create_test_app();

        let refresh = |uri: &str| {
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap()
        };

        let response = app
            .clone()
            .oneshot(refresh("/api/sources/events:TKO-%C3%A4ly/refresh"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.clone().oneshot(refresh("/api/sources/election/refresh")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = app.clone().oneshot(refresh("/api/sources/nope/refresh")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let sources: SourcesResponse = body_json(get(app, "/api/sources").await).await;
        assert_eq!(sources.schedule.len(), 2);
        let election = sources.datasets.iter().find(|d| d.name == "election").unwrap();
        assert_eq!(election.failures, 1);
        assert!(!election.loaded);
    }
}
