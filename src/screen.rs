//! Main air quality screen
//!
//! Orchestrates the whole flow: location services, permissions, location
//! fix, reverse geocoding, pollution lookup and rendering. Every failure ends
//! the current refresh with a notice; only a refused settings prompt or a
//! refused permission ends the screen.

use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::AppError;
use crate::airvisual::AirQualityApi;
use crate::device::{Device, LOCATION_PERMISSIONS, LocationServices, PermissionGate, PermissionStatus};
use crate::geocoding::{Geocoder, resolve_address};
use crate::location::LocationProvider;
use crate::map_picker::{DEFAULT_ZOOM, MapCamera, MapPicker};
use crate::models::{AqiCategory, Coordinate, PollutionReading};

/// What the screen currently shows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScreenState {
    /// Coordinate of the last refresh that got past the location check
    pub coordinate: Option<Coordinate>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub aqi_text: Option<String>,
    pub timestamp_text: Option<String>,
    pub category: Option<AqiCategory>,
}

impl ScreenState {
    fn show_reading(&mut self, reading: &PollutionReading, timezone: Tz) {
        self.aqi_text = Some(reading.aqi_us.to_string());
        self.timestamp_text = Some(reading.local_timestamp(timezone));
        self.category = Some(reading.category());
    }
}

/// Where the rendered state and transient notices go
pub trait ScreenView {
    fn render(&mut self, state: &ScreenState);

    fn notify(&mut self, notice: &AppError);
}

/// Why the screen closed before showing anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    LocationServicesDisabled,
    PermissionDenied,
}

/// Result of one refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No location fix; nothing was fetched
    LocationUnavailable,
    Refreshed {
        address_resolved: bool,
        reading_updated: bool,
    },
}

impl RefreshOutcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            RefreshOutcome::Refreshed {
                address_resolved: true,
                reading_updated: true
            }
        )
    }
}

/// Result of starting the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenOutcome {
    Ready(RefreshOutcome),
    Finished(FinishReason),
}

/// Display and lookup settings for the screen
#[derive(Debug, Clone, Copy)]
pub struct ScreenSettings {
    pub timezone: Tz,
    pub max_addresses: usize,
    pub map_zoom: f32,
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Seoul,
            max_addresses: 7,
            map_zoom: DEFAULT_ZOOM,
        }
    }
}

/// The main screen and its collaborators
pub struct AirQualityScreen<V: ScreenView> {
    device: Box<dyn Device>,
    location: LocationProvider,
    geocoder: Box<dyn Geocoder>,
    air_quality: Box<dyn AirQualityApi>,
    view: V,
    settings: ScreenSettings,
    state: ScreenState,
}

impl<V: ScreenView> AirQualityScreen<V> {
    pub fn new(
        device: Box<dyn Device>,
        location: LocationProvider,
        geocoder: Box<dyn Geocoder>,
        air_quality: Box<dyn AirQualityApi>,
        view: V,
        settings: ScreenSettings,
    ) -> Self {
        Self {
            device,
            location,
            geocoder,
            air_quality,
            view,
            settings,
            state: ScreenState::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &ScreenState {
        &self.state
    }

    #[must_use]
    pub fn view(&self) -> &V {
        &self.view
    }

    fn finish(&mut self, notice: AppError) -> ScreenOutcome {
        warn!("Closing screen: {}", notice);
        self.view.notify(&notice);
        match notice {
            AppError::PermissionDenied => ScreenOutcome::Finished(FinishReason::PermissionDenied),
            _ => ScreenOutcome::Finished(FinishReason::LocationServicesDisabled),
        }
    }

    /// Make sure location can be used at all. Fails with a terminal error
    /// when services stay off or a permission is refused.
    async fn authorize(&mut self) -> Result<(), AppError> {
        if !self.device.is_enabled() {
            info!("Location services disabled, asking user to enable them");
            let accepted = self.device.prompt_enable().await?;
            if !accepted || !self.device.is_enabled() {
                return Err(AppError::LocationServicesDisabled);
            }
        }

        let missing = LOCATION_PERMISSIONS
            .iter()
            .any(|permission| self.device.check(*permission) != PermissionStatus::Granted);

        if missing {
            info!("Requesting location permissions");
            let statuses = self.device.request(&LOCATION_PERMISSIONS).await?;
            let all_granted = statuses.len() == LOCATION_PERMISSIONS.len()
                && statuses.iter().all(|s| *s == PermissionStatus::Granted);
            if !all_granted {
                return Err(AppError::PermissionDenied);
            }
        }

        Ok(())
    }

    /// Screen creation: authorize, then refresh from the device location
    pub async fn start(&mut self) -> Result<ScreenOutcome, AppError> {
        match self.authorize().await {
            Ok(()) => Ok(ScreenOutcome::Ready(self.refresh().await)),
            Err(e) if e.is_terminal() => Ok(self.finish(e)),
            Err(e) => Err(e),
        }
    }

    /// User-initiated refresh from the device location
    pub async fn refresh(&mut self) -> RefreshOutcome {
        let coordinate = self.location.current_coordinate().await;
        self.refresh_at(coordinate).await
    }

    /// Resolve and render address and pollution for `coordinate`
    #[instrument(skip_all, fields(coordinate = %coordinate))]
    pub async fn refresh_at(&mut self, coordinate: Coordinate) -> RefreshOutcome {
        if coordinate.is_unknown() {
            warn!("Location unknown, skipping lookups");
            self.view.notify(&AppError::LocationUnavailable);
            return RefreshOutcome::LocationUnavailable;
        }
        self.state.coordinate = Some(coordinate);

        let address_resolved = match resolve_address(
            self.geocoder.as_ref(),
            coordinate,
            self.settings.max_addresses,
        )
        .await
        {
            Ok(address) => {
                self.state.title = address.title();
                self.state.subtitle = address.subtitle();
                true
            }
            Err(e) => {
                warn!("Reverse geocoding failed: {}", e);
                self.state.title = None;
                self.state.subtitle = None;
                self.view.notify(&AppError::from(e));
                false
            }
        };
        self.view.render(&self.state);

        let reading_updated = match self.air_quality.nearest_city(coordinate).await {
            Ok(reading) => {
                self.state.show_reading(&reading, self.settings.timezone);
                true
            }
            Err(e) => {
                warn!("Air quality lookup failed, keeping previous reading: {}", e);
                self.view.notify(&AppError::from(e));
                false
            }
        };
        self.view.render(&self.state);

        RefreshOutcome::Refreshed {
            address_resolved,
            reading_updated,
        }
    }

    /// Open the map picker on the current coordinate and refresh at the
    /// picked one. `None` when the user backed out.
    pub async fn pick_location(
        &mut self,
        picker: &mut dyn MapPicker,
    ) -> Result<Option<RefreshOutcome>, AppError> {
        let center = self.state.coordinate.unwrap_or(Coordinate::UNKNOWN);
        let camera = MapCamera::new(center, self.settings.map_zoom);

        match picker.pick(camera).await? {
            Some(picked) => {
                info!("Map picker returned {}", picked);
                Ok(Some(self.refresh_at(picked).await))
            }
            None => {
                info!("Map picker cancelled");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airvisual::AirQualityError;
    use crate::device::Permission;
    use crate::geocoding::GeocodingError;
    use crate::location::{Fix, LocationSource, ProviderKind};
    use crate::map_picker::FixedPicker;
    use crate::models::Address;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingView {
        renders: Vec<ScreenState>,
        notices: Vec<String>,
    }

    impl ScreenView for RecordingView {
        fn render(&mut self, state: &ScreenState) {
            self.renders.push(state.clone());
        }

        fn notify(&mut self, notice: &AppError) {
            self.notices.push(notice.user_message());
        }
    }

    struct MockDevice {
        enabled: bool,
        accept_settings: bool,
        granted: bool,
        grant_on_request: bool,
        request_fails: bool,
        requests: Arc<Mutex<usize>>,
    }

    impl MockDevice {
        fn ready() -> Self {
            Self {
                enabled: true,
                accept_settings: false,
                granted: true,
                grant_on_request: false,
                request_fails: false,
                requests: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl LocationServices for MockDevice {
        fn is_enabled(&self) -> bool {
            self.enabled
        }

        async fn prompt_enable(&mut self) -> Result<bool, AppError> {
            if self.accept_settings {
                self.enabled = true;
            }
            Ok(self.accept_settings)
        }
    }

    #[async_trait]
    impl PermissionGate for MockDevice {
        fn check(&self, _permission: Permission) -> PermissionStatus {
            if self.granted {
                PermissionStatus::Granted
            } else {
                PermissionStatus::NotDetermined
            }
        }

        async fn request(
            &mut self,
            permissions: &[Permission],
        ) -> Result<Vec<PermissionStatus>, AppError> {
            *self.requests.lock().unwrap() += 1;
            if self.request_fails {
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
            }
            let status = if self.grant_on_request {
                self.granted = true;
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            };
            Ok(vec![status; permissions.len()])
        }
    }

    struct FixedSource(Option<Coordinate>);

    #[async_trait]
    impl LocationSource for FixedSource {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Gps
        }

        fn is_enabled(&self) -> bool {
            true
        }

        async fn last_known(&self) -> Option<Fix> {
            self.0.map(|coordinate| Fix {
                coordinate,
                accuracy_m: Some(10.0),
                recorded_at: Utc::now(),
            })
        }
    }

    #[derive(Clone)]
    struct MockGeocoder {
        result: Result<Vec<Address>, GeocodingError>,
        calls: Arc<Mutex<Vec<Coordinate>>>,
    }

    #[async_trait]
    impl Geocoder for MockGeocoder {
        async fn reverse(
            &self,
            coordinate: Coordinate,
            _max_results: usize,
        ) -> Result<Vec<Address>, GeocodingError> {
            self.calls.lock().unwrap().push(coordinate);
            self.result.clone()
        }
    }

    #[derive(Clone)]
    struct ScriptedApi {
        responses: Arc<Mutex<VecDeque<Result<PollutionReading, AirQualityError>>>>,
        calls: Arc<Mutex<Vec<Coordinate>>>,
    }

    #[async_trait]
    impl AirQualityApi for ScriptedApi {
        async fn nearest_city(
            &self,
            coordinate: Coordinate,
        ) -> Result<PollutionReading, AirQualityError> {
            self.calls.lock().unwrap().push(coordinate);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(AirQualityError::Network("script exhausted".to_string())))
        }
    }

    fn gangnam() -> Address {
        Address {
            admin_area: Some("Seoul".to_string()),
            locality: Some("Gangnam-gu".to_string()),
            ..Address::default()
        }
    }

    fn reading(aqi: u32) -> PollutionReading {
        PollutionReading::new(aqi, Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap())
    }

    struct Harness {
        screen: AirQualityScreen<RecordingView>,
        geocoder_calls: Arc<Mutex<Vec<Coordinate>>>,
        api_calls: Arc<Mutex<Vec<Coordinate>>>,
    }

    fn harness(
        device: MockDevice,
        location: Option<Coordinate>,
        geocode: Result<Vec<Address>, GeocodingError>,
        responses: Vec<Result<PollutionReading, AirQualityError>>,
    ) -> Harness {
        let geocoder = MockGeocoder {
            result: geocode,
            calls: Arc::default(),
        };
        let api = ScriptedApi {
            responses: Arc::new(Mutex::new(responses.into())),
            calls: Arc::default(),
        };
        let geocoder_calls = geocoder.calls.clone();
        let api_calls = api.calls.clone();
        let provider = LocationProvider::new(Some(Box::new(FixedSource(location))), None);

        Harness {
            screen: AirQualityScreen::new(
                Box::new(device),
                provider,
                Box::new(geocoder),
                Box::new(api),
                RecordingView::default(),
                ScreenSettings::default(),
            ),
            geocoder_calls,
            api_calls,
        }
    }

    #[tokio::test]
    async fn test_unknown_location_short_circuits() {
        let mut h = harness(MockDevice::ready(), None, Ok(vec![gangnam()]), vec![Ok(reading(10))]);

        let outcome = h.screen.start().await.unwrap();

        assert_eq!(
            outcome,
            ScreenOutcome::Ready(RefreshOutcome::LocationUnavailable)
        );
        assert!(h.geocoder_calls.lock().unwrap().is_empty());
        assert!(h.api_calls.lock().unwrap().is_empty());
        assert_eq!(
            h.screen.view().notices,
            vec![AppError::LocationUnavailable.user_message()]
        );
        assert!(h.screen.view().renders.is_empty());
        assert_eq!(h.screen.state(), &ScreenState::default());
    }

    #[tokio::test]
    async fn test_zero_zero_fix_counts_as_unknown() {
        let mut h = harness(
            MockDevice::ready(),
            Some(Coordinate::new(0.0, 0.0)),
            Ok(vec![gangnam()]),
            vec![Ok(reading(10))],
        );
        assert_eq!(h.screen.refresh().await, RefreshOutcome::LocationUnavailable);
        assert!(h.api_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_refresh_renders_address_and_reading() {
        let mut h = harness(
            MockDevice::ready(),
            Some(Coordinate::new(37.4979, 127.0276)),
            Ok(vec![gangnam()]),
            vec![Ok(reading(160))],
        );

        let outcome = h.screen.start().await.unwrap();
        assert!(matches!(outcome, ScreenOutcome::Ready(r) if r.is_complete()));

        let state = h.screen.state();
        assert_eq!(state.title.as_deref(), Some("Gangnam-gu"));
        assert_eq!(state.subtitle.as_deref(), Some("Seoul"));
        assert_eq!(state.aqi_text.as_deref(), Some("160"));
        assert_eq!(state.timestamp_text.as_deref(), Some("2024-05-01 12:00"));
        assert_eq!(state.category, Some(AqiCategory::Bad));
        assert!(h.screen.view().notices.is_empty());
        assert_eq!(h.screen.view().renders.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_air_quality_keeps_previous_reading() {
        let mut h = harness(
            MockDevice::ready(),
            Some(Coordinate::new(37.5, 127.0)),
            Ok(vec![gangnam()]),
            vec![Ok(reading(42)), Err(AirQualityError::Status { status: 503 })],
        );

        h.screen.start().await.unwrap();
        assert_eq!(h.screen.state().aqi_text.as_deref(), Some("42"));

        let outcome = h.screen.refresh().await;
        assert_eq!(
            outcome,
            RefreshOutcome::Refreshed {
                address_resolved: true,
                reading_updated: false
            }
        );
        assert_eq!(h.screen.state().aqi_text.as_deref(), Some("42"));
        assert_eq!(h.screen.state().category, Some(AqiCategory::Good));
        assert_eq!(
            h.screen.view().notices,
            vec![AppError::from(AirQualityError::Status { status: 503 }).user_message()]
        );
    }

    #[tokio::test]
    async fn test_geocoding_failure_still_fetches_reading() {
        let mut h = harness(
            MockDevice::ready(),
            Some(Coordinate::new(37.5, 127.0)),
            Err(GeocodingError::ServiceUnavailable("offline".to_string())),
            vec![Ok(reading(75))],
        );

        let outcome = h.screen.refresh().await;
        assert_eq!(
            outcome,
            RefreshOutcome::Refreshed {
                address_resolved: false,
                reading_updated: true
            }
        );
        assert_eq!(h.screen.state().title, None);
        assert_eq!(h.screen.state().aqi_text.as_deref(), Some("75"));
        assert_eq!(
            h.screen.view().notices,
            vec!["The geocoding service is unavailable.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_map_pick_round_trip_fetches_once() {
        let mut h = harness(
            MockDevice::ready(),
            Some(Coordinate::new(35.1796, 129.0756)),
            Ok(vec![gangnam()]),
            vec![Ok(reading(30)), Ok(reading(120))],
        );
        h.screen.start().await.unwrap();
        h.geocoder_calls.lock().unwrap().clear();
        h.api_calls.lock().unwrap().clear();

        let picked = Coordinate::new(37.5, 127.0);
        let mut picker = FixedPicker(Some(picked));
        let outcome = h.screen.pick_location(&mut picker).await.unwrap();

        assert!(outcome.is_some_and(|o| o.is_complete()));
        assert_eq!(*h.geocoder_calls.lock().unwrap(), vec![picked]);
        assert_eq!(*h.api_calls.lock().unwrap(), vec![picked]);
        assert_eq!(h.screen.state().coordinate, Some(picked));
        assert_eq!(h.screen.state().aqi_text.as_deref(), Some("120"));
    }

    #[tokio::test]
    async fn test_map_pick_cancel_fetches_nothing() {
        let mut h = harness(
            MockDevice::ready(),
            Some(Coordinate::new(37.5, 127.0)),
            Ok(vec![gangnam()]),
            vec![],
        );
        let mut picker = FixedPicker(None);
        assert_eq!(h.screen.pick_location(&mut picker).await.unwrap(), None);
        assert!(h.geocoder_calls.lock().unwrap().is_empty());
        assert!(h.api_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_permission_denied_finishes_screen() {
        let device = MockDevice {
            granted: false,
            ..MockDevice::ready()
        };
        let requests = device.requests.clone();
        let mut h = harness(device, Some(Coordinate::new(37.5, 127.0)), Ok(vec![]), vec![]);

        let outcome = h.screen.start().await.unwrap();

        assert_eq!(outcome, ScreenOutcome::Finished(FinishReason::PermissionDenied));
        assert_eq!(*requests.lock().unwrap(), 1);
        assert!(h.api_calls.lock().unwrap().is_empty());
        assert_eq!(
            h.screen.view().notices,
            vec![AppError::PermissionDenied.user_message()]
        );
    }

    #[tokio::test]
    async fn test_device_io_error_is_not_a_finish() {
        let device = MockDevice {
            granted: false,
            request_fails: true,
            ..MockDevice::ready()
        };
        let mut h = harness(device, Some(Coordinate::new(37.5, 127.0)), Ok(vec![]), vec![]);

        let result = h.screen.start().await;

        assert!(matches!(result, Err(AppError::Io { .. })));
        assert!(h.screen.view().notices.is_empty());
        assert!(h.geocoder_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_permission_granted_on_request_proceeds() {
        let device = MockDevice {
            granted: false,
            grant_on_request: true,
            ..MockDevice::ready()
        };
        let mut h = harness(
            device,
            Some(Coordinate::new(37.5, 127.0)),
            Ok(vec![gangnam()]),
            vec![Ok(reading(20))],
        );
        let outcome = h.screen.start().await.unwrap();
        assert!(matches!(outcome, ScreenOutcome::Ready(r) if r.is_complete()));
    }

    #[tokio::test]
    async fn test_location_services_declined_finishes_screen() {
        let device = MockDevice {
            enabled: false,
            ..MockDevice::ready()
        };
        let mut h = harness(device, Some(Coordinate::new(37.5, 127.0)), Ok(vec![]), vec![]);
        let outcome = h.screen.start().await.unwrap();
        assert_eq!(
            outcome,
            ScreenOutcome::Finished(FinishReason::LocationServicesDisabled)
        );
        assert!(h.geocoder_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_location_services_enabled_from_settings() {
        let device = MockDevice {
            enabled: false,
            accept_settings: true,
            ..MockDevice::ready()
        };
        let mut h = harness(
            device,
            Some(Coordinate::new(37.5, 127.0)),
            Ok(vec![gangnam()]),
            vec![Ok(reading(20))],
        );
        let outcome = h.screen.start().await.unwrap();
        assert!(matches!(outcome, ScreenOutcome::Ready(_)));
        assert_eq!(h.api_calls.lock().unwrap().len(), 1);
    }
}
