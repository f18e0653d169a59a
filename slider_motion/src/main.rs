//! # Slider Motion Binary
//!
//! Boots the motion core of the camera slider from a TOML file and keeps it
//! running until Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! # Simulation driver with the shipped config
//! slider_motion --config config/slider.toml
//!
//! # Run the two-movement demo sequence, verbose logs
//! slider_motion --config config/slider.toml --demo -v
//! ```

use clap::Parser;
use slider_common::config::{ConfigError, LogLevel, SliderConfig};
use slider_common::motion::Movement;
use slider_common::watchdog::HealthStatus;
use slider_motion::core::SliderCore;
use slider_motion::driver_registry::DriverRegistry;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Supervisor tick.
const SUPERVISOR_PERIOD: Duration = Duration::from_secs(1);

/// Camera slider motion core
#[derive(Parser, Debug)]
#[command(name = "slider_motion")]
#[command(version)]
#[command(about = "Motion-control core of the camera slider")]
#[command(long_about = None)]
struct Args {
    /// Path to the slider configuration file. Defaults apply when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HAL driver to use
    #[arg(short, long, default_value = "simulation")]
    driver: String,

    /// Create and run the demo sequence after startup
    #[arg(long)]
    demo: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("slider startup failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args);
    let log_level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);
    let config = config?;

    info!("slider motion v{} starting...", env!("CARGO_PKG_VERSION"));

    let registry = DriverRegistry::with_builtin_drivers();
    let mut driver = registry.create_driver(&args.driver)?;
    let mut core = SliderCore::start(config, driver.as_mut())?;

    let running = core.running_flag();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    if args.demo {
        start_demo(&core);
    }

    supervise(&core);
    core.shutdown();

    info!("slider motion shutdown complete");
    Ok(())
}

fn load_config(args: &Args) -> Result<SliderConfig, ConfigError> {
    match &args.config {
        Some(path) => SliderConfig::load_validated(path),
        None => {
            let config = SliderConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Two movements: out and back with a head pan, the second one simultaneous.
fn start_demo(core: &SliderCore) {
    let index = core.create_sequence("demo");
    core.add_movement(
        index,
        Movement {
            distance_mm: 50.0,
            speed: 50,
            angle: 90,
            angle_speed: 50,
            simultaneous: false,
            pause_after_ms: 200,
        },
    );
    core.add_movement(
        index,
        Movement {
            distance_mm: -50.0,
            speed: 50,
            angle: 0,
            angle_speed: 50,
            simultaneous: true,
            pause_after_ms: 0,
        },
    );
    if core.execute_sequence(index) {
        info!(index, "demo sequence started");
    } else {
        warn!(index, "demo sequence rejected");
    }
}

/// Watchdog and status loop; returns once the running flag is cleared.
fn supervise(core: &SliderCore) {
    let running = core.running_flag();
    let mut next = Instant::now() + SUPERVISOR_PERIOD;
    while running.load(Ordering::Acquire) {
        let now = Instant::now();
        if now < next {
            thread::sleep((next - now).min(Duration::from_millis(100)));
            continue;
        }
        next += SUPERVISOR_PERIOD;

        for (task, health) in core.health() {
            if let HealthStatus::Stale { age_ms } = health {
                error!(task = %task, age_ms, "task heartbeat stale");
            }
        }
        match core.status_export().snapshot_json() {
            Ok(json) => debug!(status = %json, "slider status"),
            Err(e) => warn!("status serialization failed: {e}"),
        }
    }
}

/// Default filter directive: `-v` forces debug, otherwise the configured level.
fn log_directive(verbose: bool, configured: LogLevel) -> &'static str {
    if verbose {
        LogLevel::Debug.as_filter()
    } else {
        configured.as_filter()
    }
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
///
/// `RUST_LOG`, when set, takes precedence over both.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_directive(args.verbose, configured)));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_flag_overrides_configured_level() {
        assert_eq!(log_directive(false, LogLevel::Warn), "warn");
        assert_eq!(log_directive(false, LogLevel::Trace), "trace");
        assert_eq!(log_directive(true, LogLevel::Error), "debug");
        assert_eq!(log_directive(true, LogLevel::Trace), "debug");
    }
}
