//! Data models for the air quality application
//!
//! This module contains the core domain models organized by concern:
//! - Coordinate: Geographic position and the "unknown" sentinel
//! - Address: Reverse-geocoded postal address
//! - Pollution: Air quality readings and AQI bands

pub mod address;
pub mod coordinate;
pub mod pollution;

// Re-export all public types for convenient access
pub use address::Address;
pub use coordinate::Coordinate;
pub use pollution::{AqiCategory, PollutionReading};
