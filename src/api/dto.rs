//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use crate::poller::Cached;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// DISPLAY DTOs
// ============================================

/// Query for `GET /api/display`
#[derive(Debug, Default, Deserialize)]
pub struct DisplayQuery {
    /// "json" (default) or "text"
    #[serde(default)]
    pub format: Option<String>,
}

/// Query for `GET /api/display/changes`
#[derive(Debug, Default, Deserialize)]
pub struct ChangesQuery {
    /// Last revision the client has seen
    #[serde(default)]
    pub after: u64,
    /// How long to wait, capped by the server
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangesResponse {
    pub revision: u64,
    pub changed: bool,
}

// ============================================
// SOURCE DTOs
// ============================================

/// Polling state of one dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStatus {
    pub name: String,
    pub loaded: bool,
    pub fetched_at: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub failures: u32,
}

impl DatasetStatus {
    pub fn of<T>(name: impl Into<String>, cached: &Cached<T>) -> Self {
        Self {
            name: name.into(),
            loaded: cached.value.is_some(),
            fetched_at: cached.fetched_at,
            last_attempt: cached.last_attempt,
            last_error: cached.last_error.clone(),
            failures: cached.failures,
        }
    }
}

/// A polled source and its interval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub name: String,
    pub interval_secs: u64,
}

/// Response for `GET /api/sources`
#[derive(Debug, Serialize, Deserialize)]
pub struct SourcesResponse {
    pub poller_running: bool,
    pub schedule: Vec<ScheduleEntry>,
    pub datasets: Vec<DatasetStatus>,
}

/// Response for `POST /api/sources/:name/refresh`
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub source: String,
    pub status: String,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy", "degraded" or "starting"
    pub status: String,
    pub poller: String,
    /// Datasets whose last poll failed
    pub stale_datasets: usize,
    pub revision: u64,
    pub uptime_seconds: u64,
    pub version: String,
}
