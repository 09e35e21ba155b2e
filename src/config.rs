//! Configuration management for the air quality application
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::AppError;
use crate::map_picker::{MAX_ZOOM, MIN_ZOOM};
use anyhow::{Context, Result};
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// AirVisual API configuration
    pub airvisual: AirVisualConfig,
    /// Reverse geocoding configuration
    pub geocoding: GeocodingConfig,
    /// Location provider configuration
    pub location: LocationConfig,
    /// Device behaviour (location services, permissions)
    pub device: DeviceConfig,
    /// Display settings
    pub display: DisplayConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// AirVisual API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirVisualConfig {
    /// AirVisual API key
    pub api_key: Option<String>,
    /// Base URL for the AirVisual API
    #[serde(default = "default_airvisual_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
}

/// Reverse geocoding configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Base URL of the Nominatim-compatible service
    #[serde(default = "default_geocoding_base_url")]
    pub base_url: String,
    /// Preferred language for address components
    #[serde(default = "default_language")]
    pub language: String,
    /// Maximum number of address candidates to request
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
}

/// A fixed GPS fix, standing in for the device's last known GPS location
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GpsFixConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// Accuracy radius in meters
    pub accuracy_m: Option<f32>,
}

/// Location provider configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Last known GPS fix, if the GPS provider is available
    pub gps: Option<GpsFixConfig>,
    /// Enable the IP-based network provider
    #[serde(default = "default_true")]
    pub network_enabled: bool,
    /// URL of the IP geolocation service
    #[serde(default = "default_network_url")]
    pub network_url: String,
    /// IP geolocation request timeout in seconds
    #[serde(default = "default_network_timeout")]
    pub timeout_seconds: u32,
}

/// Device behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Whether location services start enabled
    #[serde(default = "default_true")]
    pub location_services: bool,
    /// Permission policy: granted, denied or prompt
    #[serde(default = "default_permissions")]
    pub permissions: String,
}

/// Display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// IANA timezone used for observation timestamps
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Initial zoom level of the map picker
    #[serde(default = "default_zoom")]
    pub map_zoom: f32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_airvisual_base_url() -> String {
    "https://api.airvisual.com/v2".to_string()
}

fn default_geocoding_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_network_url() -> String {
    "https://ipinfo.io/json".to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_network_timeout() -> u32 {
    10
}

fn default_language() -> String {
    "en".to_string()
}

fn default_max_results() -> u32 {
    7
}

fn default_true() -> bool {
    true
}

fn default_permissions() -> String {
    "prompt".to_string()
}

fn default_timezone() -> String {
    "Asia/Seoul".to_string()
}

fn default_zoom() -> f32 {
    16.0
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for AirVisualConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_airvisual_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoding_base_url(),
            language: default_language(),
            max_results: default_max_results(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            gps: None,
            network_enabled: default_true(),
            network_url: default_network_url(),
            timeout_seconds: default_network_timeout(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            location_services: default_true(),
            permissions: default_permissions(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            map_zoom: default_zoom(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `config_path`, or the default location when
    /// `None`, then apply `AIRQUALITY_*` environment overrides
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // AIRQUALITY_AIRVISUAL__API_KEY -> airvisual.api_key
        builder = builder.add_source(
            Environment::with_prefix("AIRQUALITY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("airquality").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.airvisual.base_url.is_empty() {
            self.airvisual.base_url = default_airvisual_base_url();
        }
        if self.airvisual.timeout_seconds == 0 {
            self.airvisual.timeout_seconds = default_timeout();
        }
        if self.geocoding.base_url.is_empty() {
            self.geocoding.base_url = default_geocoding_base_url();
        }
        if self.geocoding.language.is_empty() {
            self.geocoding.language = default_language();
        }
        if self.geocoding.max_results == 0 {
            self.geocoding.max_results = default_max_results();
        }
        if self.geocoding.timeout_seconds == 0 {
            self.geocoding.timeout_seconds = default_timeout();
        }
        if self.location.network_url.is_empty() {
            self.location.network_url = default_network_url();
        }
        if self.location.timeout_seconds == 0 {
            self.location.timeout_seconds = default_network_timeout();
        }
        if self.device.permissions.is_empty() {
            self.device.permissions = default_permissions();
        }
        if self.display.timezone.is_empty() {
            self.display.timezone = default_timezone();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate the AirVisual API key, when one is configured
    pub fn validate_api_keys(&self) -> Result<()> {
        if let Some(api_key) = &self.airvisual.api_key {
            if api_key.trim().is_empty() {
                return Err(AppError::config(
                    "AirVisual API key cannot be empty if provided. Either remove it or provide a valid key.",
                )
                .into());
            }

            if api_key.len() < 8 {
                return Err(AppError::config(
                    "AirVisual API key appears to be invalid (too short). Please check your API key.",
                )
                .into());
            }

            if api_key.len() > 100 {
                return Err(AppError::config(
                    "AirVisual API key appears to be invalid (too long). Please check your API key.",
                )
                .into());
            }
        }

        Ok(())
    }

    /// Require an API key before talking to AirVisual
    pub fn require_api_key(&self) -> std::result::Result<&str, AppError> {
        self.airvisual.api_key.as_deref().ok_or_else(|| {
            AppError::config(
                "AirVisual API key is missing. Set airvisual.api_key or AIRQUALITY_AIRVISUAL__API_KEY",
            )
        })
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if [
            self.airvisual.timeout_seconds,
            self.geocoding.timeout_seconds,
            self.location.timeout_seconds,
        ]
        .iter()
        .any(|timeout| *timeout > 300)
        {
            return Err(AppError::config("Request timeout cannot exceed 300 seconds").into());
        }

        if self.geocoding.max_results > 50 {
            return Err(AppError::config("Geocoding max results cannot exceed 50").into());
        }

        if !(MIN_ZOOM..=MAX_ZOOM).contains(&self.display.map_zoom) {
            return Err(AppError::config(format!(
                "Map zoom must be between {MIN_ZOOM} and {MAX_ZOOM}, got {}",
                self.display.map_zoom
            ))
            .into());
        }

        if let Some(gps) = &self.location.gps {
            if !(-90.0..=90.0).contains(&gps.latitude) || !(-180.0..=180.0).contains(&gps.longitude)
            {
                return Err(AppError::config(format!(
                    "GPS fix out of range: {}, {}",
                    gps.latitude, gps.longitude
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(AppError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(AppError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let valid_permissions = ["granted", "denied", "prompt"];
        if !valid_permissions.contains(&self.device.permissions.as_str()) {
            return Err(AppError::config(format!(
                "Invalid permission policy '{}'. Must be one of: {}",
                self.device.permissions,
                valid_permissions.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("AirVisual", &self.airvisual.base_url),
            ("Geocoding", &self.geocoding.base_url),
            ("Network location", &self.location.network_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AppError::config(format!(
                    "{name} URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        self.timezone()?;

        Ok(())
    }

    /// Parsed display timezone
    pub fn timezone(&self) -> std::result::Result<Tz, AppError> {
        self.display.timezone.parse::<Tz>().map_err(|e| {
            AppError::config(format!(
                "Invalid timezone '{}': {e}",
                self.display.timezone
            ))
        })
    }

    /// API key with everything but the last four characters masked
    #[must_use]
    pub fn masked_api_key(&self) -> String {
        let Some(key) = &self.airvisual.api_key else {
            return "(not set)".to_string();
        };

        let chars: Vec<char> = key.chars().collect();
        if chars.len() <= 4 {
            return "****".to_string();
        }
        let visible: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), visible)
    }
}
