//! Election Turnout Source
//!
//! Reads turnout percentages from the student-union election result feed:
//! the total from `votes_by_hour.json` and one faculty's share from
//! `votes_by_faculty.json`. Each figure is fetched independently and simply
//! missing when its request fails.

use super::{get_json, DatasetKey, HttpSettings, Snapshot, Source, SourceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Turnout figures, in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turnout {
    pub total: Option<f64>,
    pub faculty_name: String,
    pub faculty: Option<f64>,
}

/// Client for the election result feed
pub struct ElectionSource {
    client: reqwest::Client,
    by_faculty_url: String,
    by_hour_url: String,
    faculty: String,
}

impl ElectionSource {
    pub fn new(
        by_faculty_url: impl Into<String>,
        by_hour_url: impl Into<String>,
        faculty: impl Into<String>,
        http: &HttpSettings,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: http.client()?,
            by_faculty_url: by_faculty_url.into(),
            by_hour_url: by_hour_url.into(),
            faculty: faculty.into(),
        })
    }

    /// Turnout percentage of the configured faculty
    pub async fn faculty_percentage(&self) -> Result<f64, SourceError> {
        let body = get_json(&self.client, &self.by_faculty_url).await?;
        faculty_percentage(&body, &self.faculty)
    }

    /// Total turnout percentage
    pub async fn total_percentage(&self) -> Result<f64, SourceError> {
        let body = get_json(&self.client, &self.by_hour_url).await?;
        total_percentage(&body)
    }

    /// Fetch both figures. Fails only when neither could be fetched.
    pub async fn fetch_turnout(&self) -> Result<Turnout, SourceError> {
        let (total, faculty) = tokio::join!(self.total_percentage(), self.faculty_percentage());

        match (total, faculty) {
            (Err(e), Err(_)) => Err(e),
            (total, faculty) => Ok(Turnout {
                total: total
                    .map_err(|e| tracing::warn!(error = %e, "Total turnout unavailable"))
                    .ok(),
                faculty_name: self.faculty.clone(),
                faculty: faculty
                    .map_err(|e| tracing::warn!(error = %e, faculty = %self.faculty, "Faculty turnout unavailable"))
                    .ok(),
            }),
        }
    }
}

#[async_trait]
impl Source for ElectionSource {
    fn name(&self) -> &str {
        "election"
    }

    fn dataset(&self) -> DatasetKey {
        DatasetKey::Election
    }

    async fn fetch(&self) -> Result<Snapshot, SourceError> {
        Ok(Snapshot::Election(self.fetch_turnout().await?))
    }
}

fn faculty_percentage(body: &Value, faculty: &str) -> Result<f64, SourceError> {
    body.pointer("/children/faculties")
        .and_then(Value::as_array)
        .and_then(|faculties| {
            faculties
                .iter()
                .find(|f| f.get("name").and_then(Value::as_str) == Some(faculty))
        })
        .and_then(|f| f.get("percentage"))
        .and_then(percentage)
        .ok_or_else(|| SourceError::Missing(format!("no turnout for faculty {}", faculty)))
}

fn total_percentage(body: &Value) -> Result<f64, SourceError> {
    body.pointer("/children/total/percentage")
        .and_then(percentage)
        .ok_or_else(|| SourceError::Missing("no total turnout".to_string()))
}

/// Percentages arrive as numbers or as numeric strings
fn percentage(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_faculty_percentage() {
        let body = json!({
            "children": {
                "faculties": [
                    null,
                    { "name": "Humanistinen", "percentage": 31.2 },
                    { "name": "Matemaattis-luonnontieteellinen", "percentage": "38,5" }
                ]
            }
        });

        assert_eq!(faculty_percentage(&body, "Humanistinen").unwrap(), 31.2);
        assert_eq!(
            faculty_percentage(&body, "Matemaattis-luonnontieteellinen").unwrap(),
            38.5
        );
        assert!(faculty_percentage(&body, "Oikeustieteellinen").is_err());
    }

    #[test]
    fn test_total_percentage() {
        let body = json!({ "children": { "total": { "percentage": 29.9 } } });
        assert_eq!(total_percentage(&body).unwrap(), 29.9);
        assert!(total_percentage(&json!({})).is_err());
    }
}
