//! campus-lens - landmark localization pipeline CLI
//!
//! Drives one photo-to-result session: capture from file, recognize via
//! the remote service, resolve distance and marker position, print the
//! outcome.
//!
//! Module structure:
//! - `domain/` - Pure types, geometry, registry, session state machine
//! - `io/` - External interfaces (recognition HTTP, capture, location, egress)
//! - `services/` - Business logic (pipeline, session controller)
//! - `infra/` - Infrastructure (config, metrics)

use campus_lens::domain::registry::BuildingRegistry;
use campus_lens::domain::session::SessionState;
use campus_lens::domain::types::{format_distance, Coordinates};
use campus_lens::infra::{Config, Metrics};
use campus_lens::io::{
    provider_from_config, FileCaptureProvider, FixedLocationProvider, LocationProvider,
    RecognitionClient, ResultLog,
};
use campus_lens::services::{SessionCommand, SessionController};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// campus-lens - identify a campus building from a photo
#[derive(Parser, Debug)]
#[command(name = "campus-lens", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Photo of the building to identify
    #[arg(short, long)]
    image: PathBuf,

    /// Image content type
    #[arg(long, default_value = "image/jpeg")]
    mime: String,

    /// Device latitude (overrides the configured location provider)
    #[arg(long, requires = "lon")]
    lat: Option<f64>,

    /// Device longitude (overrides the configured location provider)
    #[arg(long, requires = "lat")]
    lon: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!("campus-lens starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        recognition_url = %config.recognition_base_url(),
        timeout_ms = %config.recognition_timeout_ms(),
        egress_enabled = %config.egress_enabled(),
        "config_loaded"
    );

    let registry = Arc::new(BuildingRegistry::new());
    let metrics = Arc::new(Metrics::new());
    let recognizer = Arc::new(RecognitionClient::new(&config)?);

    // CLI coordinates override the configured provider
    let location: Arc<dyn LocationProvider> = match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => {
            let position = Coordinates::new(lat, lon);
            info!(position = %position, "location_provider_cli_override");
            Arc::new(FixedLocationProvider::new(position))
        }
        _ => provider_from_config(&config),
    };

    let capture = Arc::new(FileCaptureProvider::new(&args.image, &args.mime));
    let egress = if config.egress_enabled() {
        Some(ResultLog::new(config.egress_file()))
    } else {
        None
    };

    // Periodic metrics reporter (lock-free reads)
    let metrics_reporter = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        interval.tick().await; // skip the immediate first tick
        loop {
            interval.tick().await;
            metrics_reporter.report().log();
        }
    });

    let (controller, mut state_rx) = SessionController::new(
        registry.clone(),
        recognizer,
        location,
        capture,
        metrics.clone(),
        egress,
    );
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let controller_handle = tokio::spawn(controller.run(cmd_rx));

    cmd_tx.send(SessionCommand::Capture).await?;
    cmd_tx.send(SessionCommand::Analyze).await?;

    // Wait for the session to settle in a terminal state.
    let outcome = loop {
        let state = state_rx.borrow_and_update().clone();
        match state {
            SessionState::Result(result) => break Ok(result),
            SessionState::Error(message) => break Err(message),
            _ => {}
        }
        state_rx.changed().await?;
    };

    drop(cmd_tx);
    controller_handle.await?;

    metrics.report().log();

    match outcome {
        Ok(result) => {
            let record = registry.get(result.building);
            println!("Building:   {} ({})", result.building, record.info);
            println!(
                "            {} floors, facilities: {}",
                record.floor_count,
                record.facilities.join(", ")
            );
            println!(
                "Distance:   {} ({} confidence, {:.0}%)",
                format_distance(result.distance_m),
                result.tier.as_str(),
                result.confidence * 100.0
            );
            println!("Marker at:  {}", result.display_position);
            println!("Building at {}", record.position);
            Ok(())
        }
        Err(message) => Err(message.into()),
    }
}
