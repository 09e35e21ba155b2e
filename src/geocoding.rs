//! Reverse geocoding: coordinates to a structured postal address

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::API_CLIENT;
use crate::config::GeocodingConfig;
use crate::models::{Address, Coordinate};

/// Failure to resolve an address
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodingError {
    /// The geocoding service could not be reached or answered garbage
    #[error("geocoding service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Latitude or longitude outside the valid range
    #[error("invalid coordinate: {latitude}, {longitude}")]
    InvalidArgument { latitude: f64, longitude: f64 },

    /// The service answered but knows no address for the point
    #[error("no address found")]
    NotFound,
}

/// Converts coordinates into address candidates, best match first
///
/// `max_results` caps the candidate list; a cap of zero is treated as one.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(
        &self,
        coordinate: Coordinate,
        max_results: usize,
    ) -> Result<Vec<Address>, GeocodingError>;
}

/// Best candidate for a coordinate; an empty candidate list is `NotFound`
pub async fn resolve_address(
    geocoder: &dyn Geocoder,
    coordinate: Coordinate,
    max_results: usize,
) -> Result<Address, GeocodingError> {
    geocoder
        .reverse(coordinate, max_results)
        .await?
        .into_iter()
        .find(|address| !address.is_empty())
        .ok_or(GeocodingError::NotFound)
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    error: Option<String>,
    #[serde(default)]
    address: HashMap<String, String>,
}

impl NominatimResponse {
    fn into_address(mut self) -> Address {
        let mut first_of = |keys: &[&str]| keys.iter().find_map(|key| self.address.remove(*key));

        Address {
            admin_area: first_of(&["state", "province", "region"]),
            locality: first_of(&["city", "town", "village", "municipality", "county"]),
            sub_locality: first_of(&["borough", "city_district", "suburb", "quarter"]),
            thoroughfare: first_of(&["road", "pedestrian"]),
            sub_thoroughfare: first_of(&["house_number"]),
            country_name: first_of(&["country"]),
            postal_code: first_of(&["postcode"]),
        }
    }
}

/// Reverse geocoder backed by a Nominatim-compatible service
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    base_url: String,
    language: String,
    timeout: Duration,
}

impl NominatimGeocoder {
    /// Create a geocoder from configuration
    #[must_use]
    pub fn new(config: &GeocodingConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            timeout: Duration::from_secs(config.timeout_seconds.into()),
        }
    }

    fn reverse_url(&self, coordinate: Coordinate) -> String {
        format!(
            "{}/reverse?format=jsonv2&addressdetails=1&lat={}&lon={}&accept-language={}",
            self.base_url,
            coordinate.latitude,
            coordinate.longitude,
            urlencoding::encode(&self.language)
        )
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    #[instrument(skip(self))]
    async fn reverse(
        &self,
        coordinate: Coordinate,
        max_results: usize,
    ) -> Result<Vec<Address>, GeocodingError> {
        if !coordinate.is_valid() {
            return Err(GeocodingError::InvalidArgument {
                latitude: coordinate.latitude,
                longitude: coordinate.longitude,
            });
        }

        let response = API_CLIENT
            .get(self.reverse_url(coordinate))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!("Reverse geocoding request failed: {}", e);
                GeocodingError::ServiceUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Reverse geocoding answered HTTP {}", status);
            return Err(GeocodingError::ServiceUnavailable(format!("HTTP {status}")));
        }

        let body: NominatimResponse = response
            .json()
            .await
            .map_err(|e| GeocodingError::ServiceUnavailable(e.to_string()))?;

        if let Some(message) = &body.error {
            debug!("No address for {}: {}", coordinate, message);
            return Err(GeocodingError::NotFound);
        }

        let address = body.into_address();
        debug!("Resolved {} to {:?}", coordinate, address.title());

        Ok(std::iter::once(address).take(max_results.max(1)).collect())
    }
}
