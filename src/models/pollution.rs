//! Pollution reading and AQI classification

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display format for observation timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Current pollution at a coordinate, as reported by the air quality API
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PollutionReading {
    /// US-standard air quality index
    pub aqi_us: u32,
    /// Observation time (UTC)
    pub observed_at: DateTime<Utc>,
    /// Main pollutant code for the US index (e.g. "p2" for PM2.5)
    pub main_pollutant_us: Option<String>,
    /// Nearest monitoring city
    pub city: Option<String>,
    /// State of the monitoring city
    pub state: Option<String>,
    /// Country of the monitoring city
    pub country: Option<String>,
}

impl PollutionReading {
    /// Create a reading with only the required fields
    #[must_use]
    pub fn new(aqi_us: u32, observed_at: DateTime<Utc>) -> Self {
        Self {
            aqi_us,
            observed_at,
            main_pollutant_us: None,
            city: None,
            state: None,
            country: None,
        }
    }

    /// Band of this reading
    #[must_use]
    pub fn category(&self) -> AqiCategory {
        AqiCategory::from_aqi(self.aqi_us)
    }

    /// Observation time converted to `timezone` and formatted for display
    #[must_use]
    pub fn local_timestamp(&self, timezone: Tz) -> String {
        self.observed_at
            .with_timezone(&timezone)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }
}

/// AQI severity band used for the display text and background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AqiCategory {
    /// 0 to 50
    Good,
    /// 51 to 150
    Moderate,
    /// 151 to 200
    Bad,
    /// 201 and above
    VeryBad,
}

impl AqiCategory {
    /// Classify a US AQI value
    #[must_use]
    pub fn from_aqi(aqi: u32) -> Self {
        match aqi {
            0..=50 => AqiCategory::Good,
            51..=150 => AqiCategory::Moderate,
            151..=200 => AqiCategory::Bad,
            _ => AqiCategory::VeryBad,
        }
    }

    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::Bad => "Bad",
            AqiCategory::VeryBad => "Very bad",
        }
    }

    /// Name of the background asset shown behind the reading
    #[must_use]
    pub fn background_asset(&self) -> &'static str {
        match self {
            AqiCategory::Good => "bg_good",
            AqiCategory::Moderate => "bg_moderate",
            AqiCategory::Bad => "bg_bad",
            AqiCategory::VeryBad => "bg_very_bad",
        }
    }

    /// Emoji used by the console view
    #[must_use]
    pub fn emoji(&self) -> &'static str {
        match self {
            AqiCategory::Good => "😀",
            AqiCategory::Moderate => "🙂",
            AqiCategory::Bad => "😷",
            AqiCategory::VeryBad => "☠️",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
