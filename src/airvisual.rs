//! AirVisual API client
//!
//! Fetches the current pollution reading for the monitoring station nearest
//! to a coordinate. A single attempt is made per call: any non-success HTTP
//! status, a `status` other than `"success"` in the payload, a body that does
//! not parse, or a transport error is reported as an `AirQualityError`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::API_CLIENT;
use crate::config::AirVisualConfig;
use crate::models::{Coordinate, PollutionReading};

/// Failure to obtain a reading
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AirQualityError {
    /// Transport-level failure (DNS, connect, timeout, TLS)
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with a non-success HTTP status
    #[error("request failed with HTTP status {status}")]
    Status { status: u16 },

    /// Server answered 2xx but reported a failure in the payload
    #[error("API reported '{status}': {message}")]
    Api { status: String, message: String },

    /// Body could not be decoded
    #[error("invalid response: {0}")]
    Parse(String),
}

/// Source of pollution readings
#[async_trait]
pub trait AirQualityApi: Send + Sync {
    /// Current reading of the station nearest to `coordinate`
    async fn nearest_city(&self, coordinate: Coordinate)
    -> Result<PollutionReading, AirQualityError>;
}

/// Top-level AirVisual response
#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct NearestCityData {
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    current: CurrentData,
}

#[derive(Debug, Deserialize)]
struct CurrentData {
    pollution: PollutionData,
}

#[derive(Debug, Deserialize)]
struct PollutionData {
    ts: DateTime<Utc>,
    aqius: u32,
    mainus: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FailureData {
    message: Option<String>,
}

/// Parse an AirVisual `nearest_city` body into a reading
fn parse_nearest_city(body: &str) -> Result<PollutionReading, AirQualityError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| AirQualityError::Parse(e.to_string()))?;

    if envelope.status != "success" {
        let message = serde_json::from_value::<FailureData>(envelope.data)
            .ok()
            .and_then(|failure| failure.message)
            .unwrap_or_else(|| "no message".to_string());
        return Err(AirQualityError::Api {
            status: envelope.status,
            message,
        });
    }

    let data: NearestCityData = serde_json::from_value(envelope.data)
        .map_err(|e| AirQualityError::Parse(e.to_string()))?;

    Ok(PollutionReading {
        aqi_us: data.current.pollution.aqius,
        observed_at: data.current.pollution.ts,
        main_pollutant_us: data.current.pollution.mainus,
        city: data.city,
        state: data.state,
        country: data.country,
    })
}

/// HTTP client for the AirVisual v2 API
#[derive(Debug, Clone)]
pub struct AirVisualClient {
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl AirVisualClient {
    /// Create a client from configuration and an API key
    #[must_use]
    pub fn new(config: &AirVisualConfig, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_seconds.into()),
        }
    }

    fn nearest_city_url(&self, coordinate: Coordinate) -> String {
        format!(
            "{}/nearest_city?lat={}&lon={}&key={}",
            self.base_url,
            coordinate.latitude,
            coordinate.longitude,
            urlencoding::encode(&self.api_key)
        )
    }
}

#[async_trait]
impl AirQualityApi for AirVisualClient {
    #[instrument(skip(self), fields(lat = coordinate.latitude, lon = coordinate.longitude))]
    async fn nearest_city(
        &self,
        coordinate: Coordinate,
    ) -> Result<PollutionReading, AirQualityError> {
        let start_time = Instant::now();
        debug!("Requesting nearest city pollution from {}", self.base_url);

        let response = API_CLIENT
            .get(self.nearest_city_url(coordinate))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!("Network error talking to AirVisual: {}", e);
                AirQualityError::Network(e.without_url().to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                "AirVisual request failed with status: {} - {}",
                status,
                status.canonical_reason().unwrap_or("Unknown error")
            );
            return Err(AirQualityError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| {
            warn!("Failed to read AirVisual response body: {}", e);
            AirQualityError::Network(e.without_url().to_string())
        })?;

        let reading = parse_nearest_city(&body).inspect_err(|e| {
            error!("Failed to parse AirVisual response: {}", e);
        })?;

        info!(
            "Retrieved AQI {} ({}) in {:.3}s",
            reading.aqi_us,
            reading.category(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(reading)
    }
}
