//! Location provider
//!
//! Combines the last known fixes of a GPS source and a network source into a
//! single coordinate. When both sources have a fix, a fix that is more than
//! two minutes newer wins outright; otherwise the one with the smaller
//! accuracy radius wins, and GPS wins ties.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::API_CLIENT;
use crate::config::{GpsFixConfig, LocationConfig};
use crate::models::Coordinate;

/// Fixes further apart than this many seconds are compared by age alone
pub const SIGNIFICANTLY_NEWER_SECS: i64 = 120;

/// Accuracy attributed to IP-based fixes, in meters
const IP_FIX_ACCURACY_M: f32 = 5_000.0;

/// Which platform provider a fix came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gps,
    Network,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Gps => f.write_str("gps"),
            ProviderKind::Network => f.write_str("network"),
        }
    }
}

/// A location sample from one provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub coordinate: Coordinate,
    /// Radius of 68% confidence in meters, if the provider reports one
    pub accuracy_m: Option<f32>,
    pub recorded_at: DateTime<Utc>,
}

/// A provider that can report its last known fix
#[async_trait]
pub trait LocationSource: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn is_enabled(&self) -> bool;

    async fn last_known(&self) -> Option<Fix>;
}

/// Pick the better of a GPS fix and a network fix
#[must_use]
pub fn select_best_fix(gps: Option<Fix>, network: Option<Fix>) -> Option<Fix> {
    match (gps, network) {
        (Some(gps), Some(network)) => {
            let window = Duration::seconds(SIGNIFICANTLY_NEWER_SECS);
            let age_delta = gps.recorded_at - network.recorded_at;
            if age_delta > window {
                return Some(gps);
            }
            if age_delta < -window {
                return Some(network);
            }

            match (gps.accuracy_m, network.accuracy_m) {
                (Some(g), Some(n)) if n < g => Some(network),
                (None, Some(_)) => Some(network),
                _ => Some(gps),
            }
        }
        (gps, network) => gps.or(network),
    }
}

/// Combines a GPS and a network source
pub struct LocationProvider {
    gps: Option<Box<dyn LocationSource>>,
    network: Option<Box<dyn LocationSource>>,
}

impl LocationProvider {
    #[must_use]
    pub fn new(
        gps: Option<Box<dyn LocationSource>>,
        network: Option<Box<dyn LocationSource>>,
    ) -> Self {
        Self { gps, network }
    }

    /// Provider wired from configuration
    #[must_use]
    pub fn from_config(config: &LocationConfig) -> Self {
        let gps: Option<Box<dyn LocationSource>> = config
            .gps
            .map(|fix| Box::new(ConfiguredGpsSource::new(fix)) as Box<dyn LocationSource>);
        let network: Option<Box<dyn LocationSource>> = config.network_enabled.then(|| {
            Box::new(IpNetworkSource::new(
                config.network_url.clone(),
                std::time::Duration::from_secs(config.timeout_seconds.into()),
            )) as Box<dyn LocationSource>
        });
        Self::new(gps, network)
    }

    /// Whether at least one provider is enabled
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.sources().any(|source| source.is_enabled())
    }

    fn sources(&self) -> impl Iterator<Item = &dyn LocationSource> {
        self.gps.iter().chain(self.network.iter()).map(|source| source.as_ref())
    }

    async fn last_known(source: Option<&dyn LocationSource>) -> Option<Fix> {
        let source = source.filter(|source| source.is_enabled())?;
        let fix = source.last_known().await;
        match &fix {
            Some(fix) => debug!(provider = %source.kind(), "Last known fix {}", fix.coordinate),
            None => debug!(provider = %source.kind(), "No last known fix"),
        }
        fix
    }

    /// Best available fix, if any provider has one
    pub async fn best_fix(&self) -> Option<Fix> {
        let gps = Self::last_known(self.gps.as_deref()).await;
        let network = Self::last_known(self.network.as_deref()).await;
        select_best_fix(gps, network)
    }

    /// Coordinate of the best fix, or `Coordinate::UNKNOWN`
    pub async fn current_coordinate(&self) -> Coordinate {
        match self.best_fix().await {
            Some(fix) => {
                info!("Using location {}", fix.coordinate);
                fix.coordinate
            }
            None => {
                warn!("No location provider has a fix");
                Coordinate::UNKNOWN
            }
        }
    }
}

/// GPS source whose last known fix comes from configuration
#[derive(Debug, Clone)]
pub struct ConfiguredGpsSource {
    fix: Fix,
}

impl ConfiguredGpsSource {
    #[must_use]
    pub fn new(config: GpsFixConfig) -> Self {
        Self {
            fix: Fix {
                coordinate: Coordinate::new(config.latitude, config.longitude),
                accuracy_m: config.accuracy_m,
                recorded_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl LocationSource for ConfiguredGpsSource {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gps
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn last_known(&self) -> Option<Fix> {
        Some(self.fix)
    }
}

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    /// "lat,lon"
    loc: Option<String>,
}

fn parse_ip_location(loc: &str) -> Option<Coordinate> {
    let (lat, lon) = loc.split_once(',')?;
    let coordinate = Coordinate::new(lat.trim().parse().ok()?, lon.trim().parse().ok()?);
    coordinate.is_valid().then_some(coordinate)
}

/// Network source that geolocates the public IP address
#[derive(Debug, Clone)]
pub struct IpNetworkSource {
    url: String,
    timeout: std::time::Duration,
}

impl IpNetworkSource {
    #[must_use]
    pub fn new(url: String, timeout: std::time::Duration) -> Self {
        Self { url, timeout }
    }

    async fn lookup(&self) -> anyhow::Result<Option<Coordinate>> {
        let response = API_CLIENT
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        let info: IpInfoResponse = response.json().await?;
        Ok(info.loc.as_deref().and_then(parse_ip_location))
    }
}

#[async_trait]
impl LocationSource for IpNetworkSource {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Network
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn last_known(&self) -> Option<Fix> {
        match self.lookup().await {
            Ok(Some(coordinate)) => Some(Fix {
                coordinate,
                accuracy_m: Some(IP_FIX_ACCURACY_M),
                recorded_at: Utc::now(),
            }),
            Ok(None) => {
                warn!("IP geolocation returned no usable location");
                None
            }
            Err(e) => {
                warn!("IP geolocation failed: {}", e);
                None
            }
        }
    }
}
