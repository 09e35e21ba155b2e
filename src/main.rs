//! airquality CLI - current air quality for your location

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};

use airquality::config::AppConfig;
use airquality::device::ConsoleDevice;
use airquality::location::LocationProvider;
use airquality::map_picker::{ConsolePicker, CoordinateParser, FixedPicker};
use airquality::screen::{AirQualityScreen, RefreshOutcome, ScreenOutcome, ScreenSettings};
use airquality::view::ConsoleView;
use airquality::{AirVisualClient, AppError, NominatimGeocoder, logging};

type Screen = AirQualityScreen<ConsoleView<std::io::Stdout, std::io::Stderr>>;

/// Current air quality (AQI) and address for your location
#[derive(Parser)]
#[command(name = "airquality")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "AIRQUALITY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show address and air quality for the device location
    Show,

    /// Show address and air quality for a coordinate
    At {
        /// "LAT,LON" or LAT LON
        #[arg(required = true, num_args = 1..=2, allow_hyphen_values = true)]
        coordinates: Vec<String>,
    },

    /// Show the device location, then pick another point on the map
    Pick,

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            match e.downcast_ref::<AppError>() {
                Some(app_error) => eprintln!("Error: {}", app_error.user_message()),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load_from_path(cli.config.clone())
        .context("Failed to load configuration")?;
    logging::init(&config.logging, cli.verbose)?;
    debug!("Configuration loaded");

    match cli.command.unwrap_or(Commands::Show) {
        Commands::Show => {
            let mut screen = build_screen(&config)?;
            let outcome = screen.start().await?;
            Ok(screen_exit_code(outcome))
        }
        Commands::At { coordinates } => {
            let coordinate = CoordinateParser::parse(&coordinates.join(" "))?;
            let mut screen = build_screen(&config)?;
            let outcome = screen
                .pick_location(&mut FixedPicker(Some(coordinate)))
                .await?;
            Ok(outcome.map_or(ExitCode::FAILURE, refresh_exit_code))
        }
        Commands::Pick => {
            let mut screen = build_screen(&config)?;
            let started = screen.start().await?;
            if matches!(started, ScreenOutcome::Finished(_)) {
                return Ok(ExitCode::FAILURE);
            }

            let mut picker = ConsolePicker::stdin(screen.state().coordinate);
            match screen.pick_location(&mut picker).await? {
                Some(outcome) => Ok(refresh_exit_code(outcome)),
                None => Ok(screen_exit_code(started)),
            }
        }
        Commands::Config => {
            print_config(&config, cli.config.as_ref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_screen(config: &AppConfig) -> Result<Screen> {
    let api_key = config.require_api_key()?;
    let location = LocationProvider::from_config(&config.location);
    let device = ConsoleDevice::from_config(&config.device, location.any_enabled())?;

    let settings = ScreenSettings {
        timezone: config.timezone()?,
        max_addresses: config.geocoding.max_results as usize,
        map_zoom: config.display.map_zoom,
    };

    Ok(AirQualityScreen::new(
        Box::new(device),
        location,
        Box::new(NominatimGeocoder::new(&config.geocoding)),
        Box::new(AirVisualClient::new(&config.airvisual, api_key)),
        ConsoleView::stdio(),
        settings,
    ))
}

fn refresh_exit_code(outcome: RefreshOutcome) -> ExitCode {
    match outcome {
        RefreshOutcome::Refreshed { .. } => ExitCode::SUCCESS,
        RefreshOutcome::LocationUnavailable => ExitCode::FAILURE,
    }
}

fn screen_exit_code(outcome: ScreenOutcome) -> ExitCode {
    match outcome {
        ScreenOutcome::Ready(refresh) => refresh_exit_code(refresh),
        ScreenOutcome::Finished(_) => ExitCode::FAILURE,
    }
}

fn print_config(config: &AppConfig, explicit_path: Option<&PathBuf>) -> Result<()> {
    let path = explicit_path.cloned().or_else(AppConfig::get_config_path);
    match path {
        Some(path) if path.exists() => println!("Config file: {}", path.display()),
        Some(path) => println!("Config file: {} (not found, using defaults)", path.display()),
        None => println!("Config file: (none, using defaults)"),
    }

    let mut shown = config.clone();
    shown.airvisual.api_key = Some(config.masked_api_key());
    let rendered =
        serde_json::to_string_pretty(&shown).context("Failed to serialize configuration")?;
    println!("{rendered}");
    Ok(())
}
