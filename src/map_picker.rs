//! Map picker: lets the user move a map camera and confirm its centre
//!
//! There is no map rendering here. The camera is just a centre and a zoom
//! level, and confirming returns the centre to the caller.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::AppError;
use crate::models::Coordinate;

/// Lowest zoom the picker allows
pub const MIN_ZOOM: f32 = 12.0;
/// Highest zoom the picker allows
pub const MAX_ZOOM: f32 = 20.0;
/// Zoom used when the picker opens
pub const DEFAULT_ZOOM: f32 = 16.0;

/// Visible map region: centre and zoom level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapCamera {
    pub center: Coordinate,
    zoom: f32,
}

impl MapCamera {
    /// Camera at `center`, zoom clamped to the allowed range
    #[must_use]
    pub fn new(center: Coordinate, zoom: f32) -> Self {
        Self {
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
        }
    }

    #[must_use]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn move_to(&mut self, center: Coordinate) {
        self.center = center;
    }

    /// Pan the camera by meters north and east
    pub fn pan(&mut self, north_m: f64, east_m: f64) {
        self.center = self.center.offset_meters(north_m, east_m);
    }

    /// The coordinate under the map centre
    #[must_use]
    pub fn confirm(&self) -> Coordinate {
        self.center
    }
}

impl Default for MapCamera {
    fn default() -> Self {
        Self::new(Coordinate::UNKNOWN, DEFAULT_ZOOM)
    }
}

/// A screen where the user chooses a coordinate
#[async_trait]
pub trait MapPicker: Send {
    /// `Some` with the confirmed centre, `None` when the user backs out
    async fn pick(&mut self, camera: MapCamera) -> Result<Option<Coordinate>, AppError>;
}

/// Coordinate text parsing
pub struct CoordinateParser;

impl CoordinateParser {
    /// Parse coordinates from string like "37.5,127.0" or "37.5 127.0"
    pub fn parse(input: &str) -> Result<Coordinate, AppError> {
        let parts: Vec<&str> = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();

        if parts.len() != 2 {
            return Err(AppError::config("Coordinates must be in format 'lat,lon'"));
        }

        let latitude = parts[0]
            .parse::<f64>()
            .map_err(|_| AppError::config(format!("Invalid latitude: {}", parts[0])))?;
        let longitude = parts[1]
            .parse::<f64>()
            .map_err(|_| AppError::config(format!("Invalid longitude: {}", parts[1])))?;

        if !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::config(format!(
                "Latitude must be between -90 and 90, got: {latitude}"
            )));
        }

        if !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::config(format!(
                "Longitude must be between -180 and 180, got: {longitude}"
            )));
        }

        Ok(Coordinate::new(latitude, longitude))
    }
}

/// One line of picker input
#[derive(Debug, Clone, PartialEq)]
enum PickerCommand {
    Confirm,
    Cancel,
    Here,
    Zoom(f32),
    Pan { north_m: f64, east_m: f64 },
    MoveTo(Coordinate),
    Help,
}

fn parse_command(line: &str) -> PickerCommand {
    let line = line.trim().to_ascii_lowercase();
    let mut words = line.split_whitespace();

    match (words.next(), words.next(), words.next()) {
        (None, _, _) | (Some("ok"), None, _) => PickerCommand::Confirm,
        (Some("q" | "quit" | "cancel"), None, _) => PickerCommand::Cancel,
        (Some("here"), None, _) => PickerCommand::Here,
        (Some("zoom"), Some(level), None) => level
            .parse::<f32>()
            .ok()
            .filter(|z| z.is_finite())
            .map_or(PickerCommand::Help, PickerCommand::Zoom),
        (Some(direction @ ("n" | "s" | "e" | "w")), Some(meters), None) => {
            match meters.parse::<f64>().ok().filter(|m| m.is_finite()) {
                Some(m) => match direction {
                    "n" => PickerCommand::Pan { north_m: m, east_m: 0.0 },
                    "s" => PickerCommand::Pan { north_m: -m, east_m: 0.0 },
                    "e" => PickerCommand::Pan { north_m: 0.0, east_m: m },
                    _ => PickerCommand::Pan { north_m: 0.0, east_m: -m },
                },
                None => PickerCommand::Help,
            }
        }
        _ => CoordinateParser::parse(&line).map_or(PickerCommand::Help, PickerCommand::MoveTo),
    }
}

const PICKER_HELP: &str = "Commands: <lat,lon> | n/s/e/w <meters> | zoom <12-20> | here | ok (or empty line) | q";

/// Picker driven by lines of text on the terminal
pub struct ConsolePicker {
    input: Box<dyn AsyncBufRead + Unpin + Send>,
    home: Option<Coordinate>,
}

impl ConsolePicker {
    /// Picker reading stdin; `home` is where the "here" command jumps to
    #[must_use]
    pub fn stdin(home: Option<Coordinate>) -> Self {
        Self::with_input(Box::new(BufReader::new(tokio::io::stdin())), home)
    }

    #[must_use]
    pub fn with_input(input: Box<dyn AsyncBufRead + Unpin + Send>, home: Option<Coordinate>) -> Self {
        Self { input, home }
    }
}

#[async_trait]
impl MapPicker for ConsolePicker {
    async fn pick(&mut self, mut camera: MapCamera) -> Result<Option<Coordinate>, AppError> {
        let start = camera.center;
        eprintln!("{PICKER_HELP}");

        loop {
            eprint!("📍 {} (zoom {:.0})> ", camera.center, camera.zoom());
            let mut line = String::new();
            if self.input.read_line(&mut line).await? == 0 {
                debug!("Picker input closed, cancelling");
                return Ok(None);
            }

            match parse_command(&line) {
                PickerCommand::Confirm => {
                    let picked = camera.confirm();
                    info!(
                        "Picked {} ({:.2} km from start)",
                        picked,
                        start.distance_km(&picked)
                    );
                    return Ok(Some(picked));
                }
                PickerCommand::Cancel => return Ok(None),
                PickerCommand::Here => match self.home {
                    Some(home) => camera.move_to(home),
                    None => eprintln!("Current location is not available"),
                },
                PickerCommand::Zoom(level) => camera.set_zoom(level),
                PickerCommand::Pan { north_m, east_m } => camera.pan(north_m, east_m),
                PickerCommand::MoveTo(center) => camera.move_to(center),
                PickerCommand::Help => eprintln!("{PICKER_HELP}"),
            }
        }
    }
}

/// Picker that always confirms a preset coordinate
#[derive(Debug, Clone, Copy)]
pub struct FixedPicker(pub Option<Coordinate>);

#[async_trait]
impl MapPicker for FixedPicker {
    async fn pick(&mut self, _camera: MapCamera) -> Result<Option<Coordinate>, AppError> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    fn picker(script: &str, home: Option<Coordinate>) -> ConsolePicker {
        ConsolePicker::with_input(Box::new(Cursor::new(script.as_bytes().to_vec())), home)
    }

    #[rstest]
    #[case(5.0, MIN_ZOOM)]
    #[case(16.0, 16.0)]
    #[case(25.0, MAX_ZOOM)]
    fn test_zoom_is_clamped(#[case] requested: f32, #[case] expected: f32) {
        let mut camera = MapCamera::new(Coordinate::new(37.5, 127.0), requested);
        assert_eq!(camera.zoom(), expected);
        camera.set_zoom(requested);
        assert_eq!(camera.zoom(), expected);
    }

    #[test]
    fn test_coordinate_parser_formats() {
        assert_eq!(
            CoordinateParser::parse("37.5,127.0").unwrap(),
            Coordinate::new(37.5, 127.0)
        );
        assert_eq!(
            CoordinateParser::parse("37.5 127.0").unwrap(),
            Coordinate::new(37.5, 127.0)
        );
        assert_eq!(
            CoordinateParser::parse("-33.86, 151.21").unwrap(),
            Coordinate::new(-33.86, 151.21)
        );
    }

    #[rstest]
    #[case("91.0,8.0")]
    #[case("46.0,-181.0")]
    #[case("46.0")]
    #[case("46.0,8.0,0.0")]
    #[case("north,east")]
    fn test_coordinate_parser_rejects(#[case] input: &str) {
        assert!(CoordinateParser::parse(input).is_err());
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("\n"), PickerCommand::Confirm);
        assert_eq!(parse_command("OK"), PickerCommand::Confirm);
        assert_eq!(parse_command("q"), PickerCommand::Cancel);
        assert_eq!(parse_command("zoom 14"), PickerCommand::Zoom(14.0));
        assert_eq!(
            parse_command("w 250"),
            PickerCommand::Pan {
                north_m: 0.0,
                east_m: -250.0
            }
        );
        assert_eq!(
            parse_command("37.5, 127.0"),
            PickerCommand::MoveTo(Coordinate::new(37.5, 127.0))
        );
        assert_eq!(parse_command("fly away"), PickerCommand::Help);
    }

    #[rstest]
    #[case("n nan")]
    #[case("e inf")]
    #[case("w -infinity")]
    #[case("zoom nan")]
    #[case("zoom inf")]
    fn test_non_finite_amounts_are_rejected(#[case] line: &str) {
        assert_eq!(parse_command(line), PickerCommand::Help);
    }

    #[tokio::test]
    async fn test_console_picker_ignores_nan_pan() {
        let start = Coordinate::new(37.5, 127.0);
        let mut picker = picker("n nan\nzoom nan\nok\n", None);
        let picked = picker
            .pick(MapCamera::new(start, DEFAULT_ZOOM))
            .await
            .unwrap();
        assert_eq!(picked, Some(start));
    }

    #[tokio::test]
    async fn test_console_picker_move_and_confirm() {
        let mut picker = picker("37.5,127.0\nzoom 30\n\n", None);
        let picked = picker
            .pick(MapCamera::new(Coordinate::new(35.0, 129.0), DEFAULT_ZOOM))
            .await
            .unwrap();
        assert_eq!(picked, Some(Coordinate::new(37.5, 127.0)));
    }

    #[tokio::test]
    async fn test_console_picker_pan() {
        let mut picker = picker("n 1000\nok\n", None);
        let start = Coordinate::new(37.5, 127.0);
        let picked = picker
            .pick(MapCamera::new(start, DEFAULT_ZOOM))
            .await
            .unwrap()
            .unwrap();
        assert!(picked.latitude > start.latitude);
        assert!((start.distance_km(&picked) - 1.0).abs() < 0.05);
    }

    #[tokio::test]
    async fn test_console_picker_here_and_cancel() {
        let home = Coordinate::new(37.5665, 126.978);
        let mut picker = picker("here\n\n", Some(home));
        let picked = picker.pick(MapCamera::default()).await.unwrap();
        assert_eq!(picked, Some(home));

        let mut cancelled = self::picker("37.5,127.0\nq\n", None);
        assert_eq!(cancelled.pick(MapCamera::default()).await.unwrap(), None);

        let mut closed = self::picker("", None);
        assert_eq!(closed.pick(MapCamera::default()).await.unwrap(), None);
    }
}
