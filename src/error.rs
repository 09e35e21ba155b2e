//! Error types and handling for the air quality application

use thiserror::Error;

use crate::airvisual::AirQualityError;
use crate::geocoding::GeocodingError;

/// Main error type for the air quality application
///
/// Every variant except `Config` and `Io` corresponds to a user-visible
/// notice raised by the screen; none of them is retried.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Device location services are switched off and stayed off
    #[error("Location services are disabled")]
    LocationServicesDisabled,

    /// Fine or coarse location permission was refused
    #[error("Location permission denied")]
    PermissionDenied,

    /// Neither location provider produced a fix
    #[error("Location unavailable")]
    LocationUnavailable,

    /// Reverse geocoding failed
    #[error("Geocoding error: {0}")]
    Geocoding(#[from] GeocodingError),

    /// Air quality request failed
    #[error("Air quality error: {0}")]
    AirQuality(#[from] AirQualityError),

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config { message } => {
                format!("Configuration error: {message}. Please check your config file.")
            }
            AppError::LocationServicesDisabled => {
                "Location services are off. Enable location (GPS) on the device and try again."
                    .to_string()
            }
            AppError::PermissionDenied => {
                "Location permission was denied. Run again and allow location access.".to_string()
            }
            AppError::LocationUnavailable => {
                "Could not determine latitude and longitude. Please refresh.".to_string()
            }
            AppError::Geocoding(GeocodingError::ServiceUnavailable(_)) => {
                "The geocoding service is unavailable.".to_string()
            }
            AppError::Geocoding(GeocodingError::InvalidArgument { .. }) => {
                "Invalid latitude or longitude.".to_string()
            }
            AppError::Geocoding(GeocodingError::NotFound) => "No address was found.".to_string(),
            AppError::AirQuality(_) => {
                "Failed to load air quality data. Please check your internet connection."
                    .to_string()
            }
            AppError::Io { .. } => "Console I/O failed.".to_string(),
        }
    }

    /// Whether this error ends the screen instead of just the current refresh
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppError::LocationServicesDisabled | AppError::PermissionDenied
        )
    }
}
