//! `airquality` - current air quality for where you are
//!
//! This library resolves a location fix (or a point picked on a map) into a
//! postal address and the nearest-city AQI reading from AirVisual, and
//! drives a screen that renders both.

pub mod airvisual;
pub mod config;
pub mod device;
pub mod error;
pub mod geocoding;
pub mod location;
pub mod logging;
pub mod map_picker;
pub mod models;
pub mod screen;
pub mod view;

use std::sync::LazyLock;

// Re-export core types for public API
pub use airvisual::{AirQualityApi, AirQualityError, AirVisualClient};
pub use config::AppConfig;
pub use error::AppError;
pub use geocoding::{Geocoder, GeocodingError, NominatimGeocoder};
pub use location::{LocationProvider, select_best_fix};
pub use map_picker::{CoordinateParser, MapCamera, MapPicker};
pub use models::{Address, AqiCategory, Coordinate, PollutionReading};
pub use screen::{AirQualityScreen, RefreshOutcome, ScreenOutcome, ScreenState, ScreenView};
pub use view::ConsoleView;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared HTTP client for every outbound request
pub static API_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("airquality/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, AppError>;
