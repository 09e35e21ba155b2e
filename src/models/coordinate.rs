//! Coordinate model for geographic positions

use haversine::{Location as HaversineLocation, Units, distance};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point on the globe in decimal degrees
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinate {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl Coordinate {
    /// "No location" marker. Indistinguishable from the real point at
    /// latitude 0, longitude 0.
    pub const UNKNOWN: Coordinate = Coordinate {
        latitude: 0.0,
        longitude: 0.0,
    };

    /// Create a new coordinate
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True only when both components are exactly zero
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }

    /// Whether latitude and longitude are within their valid ranges
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Format coordinate as "lat, lon" with four decimals
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Great-circle distance to another coordinate in kilometers
    #[must_use]
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        distance(self.as_haversine(), other.as_haversine(), Units::Kilometers)
    }

    /// Move the coordinate by a number of meters north and east
    ///
    /// Flat-earth approximation, good enough for panning a map view a few
    /// kilometers at a time.
    #[must_use]
    pub fn offset_meters(&self, north_m: f64, east_m: f64) -> Self {
        const METERS_PER_DEGREE: f64 = 111_320.0;
        let latitude = (self.latitude + north_m / METERS_PER_DEGREE).clamp(-90.0, 90.0);
        let scale = self.latitude.to_radians().cos().max(1e-6);
        let longitude = self.longitude + east_m / (METERS_PER_DEGREE * scale);
        Self::new(latitude, (longitude + 180.0).rem_euclid(360.0) - 180.0)
    }

    fn as_haversine(&self) -> HaversineLocation {
        HaversineLocation {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_coordinates())
    }
}
