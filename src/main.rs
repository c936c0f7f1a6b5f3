//! # MSP Autofly
//!
//! Fly a scripted maneuver sequence on a Betaflight/INAV flight controller
//! by overriding its RC channels over MSP v2.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (defaults if the file is absent)
//!    - Set up logging (stderr, plus daily files if `logging.log_dir` is set)
//!    - Open the flight controller UART
//!
//! 2. **Flight**
//!    - Check `MSP_STATUS`; abort before any actuation if it fails
//!    - Run the selected flight plan to completion
//!
//! 3. **Interrupt**
//!    - Ctrl+C stops the process immediately
//!
//! # Examples
//!
//! ```bash
//! msp-autofly --config config/autofly.toml arm-test
//! msp-autofly --port /dev/ttyAMA0 status
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use msp_autofly::clock::TokioClock;
use msp_autofly::config::{Config, LoggingConfig};
use msp_autofly::flight::plan::FlightPlan;
use msp_autofly::flight::sequencer::Sequencer;
use msp_autofly::serial::port_trait::SerialPortIO;
use msp_autofly::serial::FcSerial;

/// Default configuration file location
const DEFAULT_CONFIG_PATH: &str = "config/autofly.toml";

/// Log file name prefix inside `logging.log_dir`
const LOG_FILE_PREFIX: &str = "msp-autofly.log";

#[derive(Parser, Debug)]
#[command(name = "msp-autofly", version, about = "Scripted multirotor flight over MSP")]
struct Cli {
    /// Configuration file (TOML).
    #[arg(long, short, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Serial device, overriding `serial.port`.
    #[arg(long, value_name = "DEVICE")]
    port: Option<String>,

    /// What to fly.
    #[arg(value_enum)]
    mode: Mode,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Status check only
    Status,
    /// Check, prearm, arm, disarm
    ArmTest,
    /// Takeoff then land
    TakeoffLand,
    /// Takeoff, forward, backward, land
    Pattern,
}

impl Mode {
    fn plan(self) -> Option<FlightPlan> {
        match self {
            Mode::Status => None,
            Mode::ArmTest => Some(FlightPlan::ArmTest),
            Mode::TakeoffLand => Some(FlightPlan::TakeoffLand),
            Mode::Pattern => Some(FlightPlan::Pattern),
        }
    }
}

/// Load the config file, or defaults when it does not exist
fn load_config(path: &Path) -> Result<(Config, bool)> {
    if !path.exists() {
        return Ok((Config::default(), false));
    }

    let config = Config::load(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    Ok((config, true))
}

fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let stderr = fmt::layer().with_writer(std::io::stderr);

    if config.log_dir.is_empty() {
        tracing_subscriber::registry().with(filter).with(stderr).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();

    Some(guard)
}

async fn fly<P, C>(sequencer: &mut Sequencer<P, C>, mode: Mode) -> Result<()>
where
    P: SerialPortIO,
    C: msp_autofly::clock::Clock,
{
    match mode.plan() {
        None => {
            if !sequencer.check_status().await {
                bail!("Flight controller did not answer MSP_STATUS");
            }
        }
        Some(plan) => sequencer.run_plan(plan).await?,
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, from_file) = load_config(&cli.config)?;
    let _log_guard = init_logging(&config.logging);

    info!("MSP Autofly v{} starting...", env!("CARGO_PKG_VERSION"));
    if !from_file {
        info!("No config at {}, using defaults", cli.config.display());
    }

    let device = cli.port.as_deref().unwrap_or(&config.serial.port);
    let serial = FcSerial::open_preferred(device, config.serial.baud_rate)?;
    info!("Flight controller port opened at: {}", serial.device_path());

    let mut sequencer = Sequencer::new(serial, TokioClock::new(), &config)
        .context("Invalid flight configuration")?;

    tokio::select! {
        result = fly(&mut sequencer, cli.mode) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received Ctrl+C, stopping mid-sequence");
        }
    }

    Ok(())
}
