//! Event List Source
//!
//! Fetches an event provider's JSON list and keeps the upcoming events,
//! soonest first. Each provider is its own source with its own subtitle and
//! poll interval.

use super::{get_json, DatasetKey, HttpSettings, Snapshot, Source, SourceError};
use crate::clock::SharedClock;
use crate::window::TimeWindow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An upcoming event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub starts: DateTime<Utc>,
    pub registration_starts: Option<DateTime<Utc>>,
    pub registration_ends: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Event {
    pub fn registration_window(&self) -> TimeWindow {
        TimeWindow::new(self.registration_starts, self.registration_ends)
    }
}

/// Client for one event provider
pub struct EventSource {
    client: reqwest::Client,
    name: String,
    subtitle: String,
    url: String,
    timezone: Tz,
    clock: SharedClock,
    max_events: usize,
}

impl EventSource {
    pub fn new(
        subtitle: impl Into<String>,
        url: impl Into<String>,
        timezone: Tz,
        clock: SharedClock,
        http: &HttpSettings,
    ) -> Result<Self, SourceError> {
        let subtitle = subtitle.into();
        Ok(Self {
            client: http.client()?,
            name: format!("events:{}", subtitle),
            subtitle,
            url: url.into(),
            timezone,
            clock,
            max_events: 10,
        })
    }

    /// Builder method: cap the number of events kept
    pub fn max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }

    pub fn subtitle(&self) -> &str {
        &self.subtitle
    }

    /// Fetch and keep events starting today or later
    pub async fn fetch_events(&self) -> Result<Vec<Event>, SourceError> {
        let body = get_json(&self.client, &self.url).await?;
        let now = self.clock.now();
        let today_start = now
            .with_timezone(&self.timezone)
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .and_then(|midnight| self.timezone.from_local_datetime(&midnight).earliest())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now);

        let events = shape_events(&body, self.timezone)?;
        Ok(upcoming(events, today_start, self.max_events))
    }
}

#[async_trait]
impl Source for EventSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn dataset(&self) -> DatasetKey {
        DatasetKey::Events(self.subtitle.clone())
    }

    async fn fetch(&self) -> Result<Snapshot, SourceError> {
        Ok(Snapshot::Events {
            subtitle: self.subtitle.clone(),
            events: self.fetch_events().await?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: Value,
    #[serde(alias = "title")]
    name: String,
    starts: String,
    #[serde(default)]
    registration_starts: Option<String>,
    #[serde(default)]
    registration_ends: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    deleted: bool,
}

/// Reshape a provider response. Accepts a bare array or `{"events": [...]}`;
/// individual malformed events are skipped.
fn shape_events(body: &Value, tz: Tz) -> Result<Vec<Event>, SourceError> {
    let list = match body {
        Value::Array(list) => list,
        Value::Object(map) => map
            .get("events")
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::Parse("expected an event list".to_string()))?,
        _ => return Err(SourceError::Parse("expected an event list".to_string())),
    };

    let mut events = Vec::with_capacity(list.len());
    for value in list {
        let raw: RawEvent = match serde_json::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed event");
                continue;
            }
        };

        if raw.deleted {
            continue;
        }

        let id = match &raw.id {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };

        let Some(starts) = parse_instant(&raw.starts, tz) else {
            tracing::warn!(event_id = %id, starts = %raw.starts, "Skipping event with unparseable start");
            continue;
        };

        events.push(Event {
            id,
            title: raw.name.trim().to_string(),
            starts,
            registration_starts: raw
                .registration_starts
                .as_deref()
                .and_then(|s| parse_instant(s, tz)),
            registration_ends: raw
                .registration_ends
                .as_deref()
                .and_then(|s| parse_instant(s, tz)),
            location: raw.location.filter(|l| !l.trim().is_empty()),
        });
    }

    Ok(events)
}

fn upcoming(mut events: Vec<Event>, not_before: DateTime<Utc>, limit: usize) -> Vec<Event> {
    events.retain(|e| e.starts >= not_before);
    events.sort_by_key(|e| e.starts);
    events.truncate(limit);
    events
}

/// Parse a provider timestamp.
///
/// RFC 3339 strings carry their own offset; naive "YYYY-MM-DD HH:MM[:SS]"
/// strings are read as local time in `tz`.
pub fn parse_instant(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];

    NAIVE_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(raw, format)
            .ok()
            .and_then(|naive| tz.from_local_datetime(&naive).earliest())
            .map(|dt| dt.with_timezone(&Utc))
    })
}
