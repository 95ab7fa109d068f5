//! `tilestream fly`: stream tiles around a simulated moving viewpoint.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tracing::{info, warn};

use tilestream::coord::{GeoPoint, EARTH_RADIUS_M, MAX_LAT, MIN_LAT};
use tilestream::logging::{default_log_dir, default_log_file, init_logging};
use tilestream::render::RenderHost;
use tilestream::{AppConfig, TileStreamApp};

use super::host::LoggingHost;
use super::load_config;
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct FlyArgs {
    /// Configuration file (default: ~/.tilestream/config.ini)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Start latitude in decimal degrees
    #[arg(long)]
    pub lat: f64,

    /// Start longitude in decimal degrees
    #[arg(long)]
    pub lon: f64,

    /// Altitude above sea level in metres
    #[arg(long, default_value = "1500")]
    pub altitude: f64,

    /// Heading in degrees clockwise from north
    #[arg(long, default_value = "0")]
    pub heading: f64,

    /// Ground speed in metres per second
    #[arg(long, default_value = "80")]
    pub speed: f64,

    /// Number of simulated steps
    #[arg(long, default_value = "20")]
    pub steps: u32,

    /// Simulated time per step in milliseconds
    #[arg(long, default_value = "1000")]
    pub step_ms: u64,

    /// Camera pitch in degrees (negative looks down)
    #[arg(long, default_value = "-30", allow_hyphen_values = true)]
    pub pitch: f64,

    /// Log directory (default: ~/.tilestream/logs)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

/// Point `distance_m` metres from `start` along the great circle leaving it
/// at `heading_deg`. Altitude is kept.
pub fn destination(start: &GeoPoint, heading_deg: f64, distance_m: f64) -> GeoPoint {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = heading_deg.to_radians();
    let lat1 = start.latitude.to_radians();
    let lon1 = start.longitude.to_radians();

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    GeoPoint::with_elevation(lat2.to_degrees(), lon2.to_degrees(), start.altitude)
}

fn validate(args: &FlyArgs) -> Result<(), CliError> {
    if !(MIN_LAT..=MAX_LAT).contains(&args.lat) {
        return Err(CliError::InvalidArgument(format!(
            "--lat must be within [{}, {}]",
            MIN_LAT, MAX_LAT
        )));
    }
    if !(-180.0..=180.0).contains(&args.lon) {
        return Err(CliError::InvalidArgument(
            "--lon must be within [-180, 180]".to_string(),
        ));
    }
    if !args.speed.is_finite() || args.speed < 0.0 {
        return Err(CliError::InvalidArgument(
            "--speed must not be negative".to_string(),
        ));
    }
    Ok(())
}

pub fn run(args: FlyArgs) -> Result<(), CliError> {
    validate(&args)?;
    let (path, file) = load_config(args.config.clone())?;

    let log_dir = args.log_dir.clone().unwrap_or_else(default_log_dir);
    let _logging = init_logging(&log_dir, default_log_file()).map_err(CliError::LoggingInit)?;
    info!(config = %path.display(), "Starting fly simulation");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst)) {
            warn!(error = %e, "Failed to install Ctrl+C handler");
        }
    }

    runtime.block_on(fly(args, file, stop))
}

async fn fly(
    args: FlyArgs,
    file: tilestream::config::ConfigFile,
    stop: Arc<AtomicBool>,
) -> Result<(), CliError> {
    let start = GeoPoint::with_elevation(args.lat, args.lon, args.altitude);
    let host = Arc::new(LoggingHost::new());
    let app = TileStreamApp::start(
        AppConfig::new(file, start),
        Arc::clone(&host) as Arc<dyn RenderHost>,
    )?;

    for rejected in app.rejected() {
        println!("Skipped layer {}: {}", rejected.name, rejected.error);
    }

    let step = Duration::from_millis(args.step_ms);
    let step_distance = args.speed * step.as_secs_f64();
    let mut position = start;

    for index in 0..args.steps {
        if stop.load(Ordering::SeqCst) {
            println!("Interrupted");
            break;
        }

        let viewpoint = app.viewpoint(&position, args.heading, args.pitch);
        let outcome = app.orchestrator().update(viewpoint).await;
        app.orchestrator().tick(tokio::time::Instant::now());
        println!(
            "step {:>3}  {:>9.5} {:>10.5}  {:<10}  tiles {}",
            index + 1,
            position.latitude,
            position.longitude,
            outcome.to_string(),
            app.orchestrator().tiles().len()
        );

        tokio::time::sleep(step).await;
        position = destination(&position, args.heading, step_distance);
    }

    println!();
    println!("Layers");
    for report in app.layer_reports() {
        let stats = report.statistics;
        println!(
            "  {:<16} {:<8} priority {:>11}  {}{}  requests {:>5}  cache hits {:>5.1}%  failures {:>3}  avg {:>6.1} ms",
            report.name,
            report.channel.to_string(),
            report.priority,
            if report.active { "active" } else { "inactive" },
            if report.current { " (current)" } else { "" },
            stats.requests,
            stats.cache_hit_rate() * 100.0,
            stats.failures,
            stats.average_request.as_secs_f64() * 1000.0,
        );
    }

    let totals = host.totals();
    println!();
    println!(
        "Host: {} targets created, {} destroyed, {} textures, {} meshes",
        totals.created, totals.destroyed, totals.textures, totals.meshes
    );
    println!();
    println!("{}", app.telemetry());

    app.shutdown();
    Ok(())
}
