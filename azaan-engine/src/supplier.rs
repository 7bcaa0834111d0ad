//! The remote source of each day's prayer times.

use crate::common::Prayer;
use crate::config::{LocationConfig, SupplierConfig};
use crate::error::{FetchError, ScheduleError};
use crate::schedule::EventTable;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// The unparsed answer of a timings supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTimings {
    /// `"HH:MM"` strings as received. Prayers the supplier left out are absent.
    pub times: HashMap<Prayer, String>,
    /// The human-readable date the times were issued for.
    pub date_label: String,
}

impl RawTimings {
    pub fn into_table(self) -> Result<EventTable, ScheduleError> {
        EventTable::build(&self.times, self.date_label)
    }
}

/// Anything that can produce today's raw prayer times.
#[async_trait]
pub trait TimingsSupplier: Send + Sync {
    async fn fetch(&self) -> Result<RawTimings, FetchError>;
}

/// Fetches timings from an Aladhan-compatible HTTP API.
pub struct AladhanClient {
    http: reqwest::Client,
    base_url: String,
    latitude: f64,
    longitude: f64,
    method: u8,
}

// Only the fields read are modelled; the provider sends much more.
#[derive(Debug, Deserialize)]
struct AladhanResponse {
    data: AladhanData,
}

#[derive(Debug, Deserialize)]
struct AladhanData {
    timings: HashMap<String, String>,
    date: AladhanDate,
}

#[derive(Debug, Deserialize)]
struct AladhanDate {
    readable: String,
}

impl AladhanClient {
    pub fn new(location: &LocationConfig, supplier: &SupplierConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: supplier.base_url.trim_end_matches('/').to_string(),
            latitude: location.latitude,
            longitude: location.longitude,
            method: location.method,
        }
    }

    fn timings_url(&self) -> String {
        format!("{}/timings", self.base_url)
    }
}

#[async_trait]
impl TimingsSupplier for AladhanClient {
    async fn fetch(&self) -> Result<RawTimings, FetchError> {
        info!("Fetching prayer times...");
        let response = self
            .http
            .get(self.timings_url())
            .query(&[
                ("latitude", self.latitude.to_string()),
                ("longitude", self.longitude.to_string()),
                ("method", self.method.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        debug!("Timings response: {} bytes", body.len());
        parse_aladhan(&body)
    }
}

/// Extracts the five prayers and the readable date from a response body.
fn parse_aladhan(body: &str) -> Result<RawTimings, FetchError> {
    let parsed: AladhanResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    let mut timings = parsed.data.timings;
    let times = Prayer::ALL
        .into_iter()
        .filter_map(|prayer| timings.remove(prayer.name()).map(|t| (prayer, t)))
        .collect();
    Ok(RawTimings {
        times,
        date_label: parsed.data.date.readable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "code": 200,
        "status": "OK",
        "data": {
            "timings": {
                "Fajr": "04:12", "Sunrise": "05:28", "Dhuhr": "12:57",
                "Asr": "16:54", "Sunset": "20:26", "Maghrib": "20:26",
                "Isha": "21:42", "Imsak": "04:02", "Midnight": "00:57"
            },
            "date": { "readable": "21 Jun 2025", "timestamp": "1750500000" }
        }
    }"#;

    #[test]
    fn parses_the_five_prayers_and_date() {
        let raw = parse_aladhan(BODY).unwrap();
        assert_eq!(raw.times.len(), 5);
        assert_eq!(raw.times[&Prayer::Maghrib], "20:26");
        assert_eq!(raw.date_label, "21 Jun 2025");

        let table = raw.into_table().unwrap();
        assert_eq!(table.time_of(Prayer::Fajr).unwrap().to_string(), "04:12");
    }

    #[test]
    fn missing_prayer_surfaces_when_building() {
        let body = BODY.replace(r#""Asr": "16:54","#, "");
        let raw = parse_aladhan(&body).unwrap();
        assert!(matches!(
            raw.into_table(),
            Err(ScheduleError::IncompleteSchedule { missing: Prayer::Asr })
        ));
    }

    #[test]
    fn garbage_body_is_a_decode_error() {
        assert!(matches!(parse_aladhan("<html>"), Err(FetchError::Decode(_))));
        assert!(matches!(parse_aladhan(r#"{"data": {}}"#), Err(FetchError::Decode(_))));
    }

    /// Serves `status` and `body` at `/v1/timings` on a local port.
    async fn provider(status: axum::http::StatusCode, body: &'static str) -> AladhanClient {
        let app = axum::Router::new().route("/v1/timings", axum::routing::get(move || async move { (status, body) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        AladhanClient::new(
            &LocationConfig::default(),
            &SupplierConfig {
                base_url: format!("http://{}/v1", addr),
            },
        )
    }

    #[tokio::test]
    async fn fetches_from_the_provider() {
        let client = provider(axum::http::StatusCode::OK, BODY).await;
        let raw = client.fetch().await.unwrap();
        assert_eq!(raw.date_label, "21 Jun 2025");
        assert_eq!(raw.times[&Prayer::Isha], "21:42");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let client = provider(axum::http::StatusCode::SERVICE_UNAVAILABLE, "busy").await;
        assert!(matches!(client.fetch().await, Err(FetchError::Status(503))));
    }

    #[test]
    fn url_ignores_trailing_slash() {
        let client = AladhanClient::new(
            &LocationConfig::default(),
            &SupplierConfig {
                base_url: "http://localhost:9/v1/".into(),
            },
        );
        assert_eq!(client.timings_url(), "http://localhost:9/v1/timings");
    }
}
