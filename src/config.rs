//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the stock behavior: 115200 baud, 1 s response timeout, 120 ms hold time.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{AutoFlyError, Result};
use crate::flight::channels::RC_NUM_CHANNELS;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub msp: MspConfig,
    #[serde(default)]
    pub channels: ChannelConfig,
    #[serde(default)]
    pub maneuver: ManeuverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Longest single blocking read
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// MSP exchange configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MspConfig {
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Extra status checks before a flight plan gives up
    #[serde(default)]
    pub status_retries: u32,
}

/// RC channel layout
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelConfig {
    #[serde(default = "default_roll_channel")]
    pub roll: usize,

    #[serde(default = "default_throttle_channel")]
    pub throttle: usize,

    #[serde(default = "default_yaw_channel")]
    pub yaw: usize,

    #[serde(default = "default_aux_arm_channel")]
    pub aux_arm: usize,

    #[serde(default = "default_center")]
    pub center: u16,
}

/// Maneuver timing and stick positions
#[derive(Debug, Deserialize, Clone)]
pub struct ManeuverConfig {
    #[serde(default = "default_hold_time_ms")]
    pub hold_time_ms: u64,

    #[serde(default = "default_prearm_repeat")]
    pub prearm_repeat: u32,

    #[serde(default = "default_arm_repeat")]
    pub arm_repeat: u32,

    #[serde(default = "default_disarm_repeat")]
    pub disarm_repeat: u32,

    #[serde(default = "default_ramp_repeat")]
    pub ramp_repeat: u32,

    #[serde(default = "default_throttle_step")]
    pub throttle_step: u16,

    #[serde(default = "default_throttle_min")]
    pub throttle_min: u16,

    #[serde(default = "default_throttle_max")]
    pub throttle_max: u16,

    #[serde(default = "default_arm_high")]
    pub arm_high: u16,

    #[serde(default = "default_arm_low")]
    pub arm_low: u16,

    #[serde(default = "default_forward_power")]
    pub forward_power: u16,

    #[serde(default = "default_backward_power")]
    pub backward_power: u16,

    #[serde(default = "default_move_duration_ms")]
    pub move_duration_ms: u64,

    #[serde(default = "default_move_send_interval_ms")]
    pub move_send_interval_ms: u64,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for daily log files; empty logs to stderr only
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_serial_port() -> String { "/dev/serial0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_timeout_ms() -> u64 { 100 }

fn default_response_timeout_ms() -> u64 { 1000 }

fn default_roll_channel() -> usize { 1 }
fn default_throttle_channel() -> usize { 2 }
fn default_yaw_channel() -> usize { 4 }
fn default_aux_arm_channel() -> usize { 6 }
fn default_center() -> u16 { 1500 }

fn default_hold_time_ms() -> u64 { 120 }
fn default_prearm_repeat() -> u32 { 8 }
fn default_arm_repeat() -> u32 { 10 }
fn default_disarm_repeat() -> u32 { 10 }
fn default_ramp_repeat() -> u32 { 40 }
fn default_throttle_step() -> u16 { 5 }
fn default_throttle_min() -> u16 { 1000 }
fn default_throttle_max() -> u16 { 1200 }
fn default_arm_high() -> u16 { 1900 }
fn default_arm_low() -> u16 { 1100 }
fn default_forward_power() -> u16 { 1550 }
fn default_backward_power() -> u16 { 1450 }
fn default_move_duration_ms() -> u64 { 1000 }
fn default_move_send_interval_ms() -> u64 { 50 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for MspConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: default_response_timeout_ms(),
            status_retries: 0,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            roll: default_roll_channel(),
            throttle: default_throttle_channel(),
            yaw: default_yaw_channel(),
            aux_arm: default_aux_arm_channel(),
            center: default_center(),
        }
    }
}

impl Default for ManeuverConfig {
    fn default() -> Self {
        Self {
            hold_time_ms: default_hold_time_ms(),
            prearm_repeat: default_prearm_repeat(),
            arm_repeat: default_arm_repeat(),
            disarm_repeat: default_disarm_repeat(),
            ramp_repeat: default_ramp_repeat(),
            throttle_step: default_throttle_step(),
            throttle_min: default_throttle_min(),
            throttle_max: default_throttle_max(),
            arm_high: default_arm_high(),
            arm_low: default_arm_low(),
            forward_power: default_forward_power(),
            backward_power: default_backward_power(),
            move_duration_ms: default_move_duration_ms(),
            move_send_interval_ms: default_move_send_interval_ms(),
        }
    }
}

impl ManeuverConfig {
    pub fn hold_time(&self) -> Duration {
        Duration::from_millis(self.hold_time_ms)
    }

    pub fn move_duration(&self) -> Duration {
        Duration::from_millis(self.move_duration_ms)
    }

    pub fn move_send_interval(&self) -> Duration {
        Duration::from_millis(self.move_send_interval_ms)
    }
}

fn invalid(msg: impl std::fmt::Display) -> AutoFlyError {
    AutoFlyError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use msp_autofly::config::Config;
    ///
    /// let config = Config::load("config/autofly.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if ![9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600]
            .contains(&self.serial.baud_rate)
        {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600",
            ));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.msp.response_timeout_ms == 0 || self.msp.response_timeout_ms > 60000 {
            return Err(invalid("response_timeout_ms must be between 1 and 60000"));
        }

        if self.msp.status_retries > 10 {
            return Err(invalid("status_retries must be at most 10"));
        }

        // Channel indices address the 16-entry override vector
        let indices = [
            ("roll", self.channels.roll),
            ("throttle", self.channels.throttle),
            ("yaw", self.channels.yaw),
            ("aux_arm", self.channels.aux_arm),
        ];
        for (name, index) in indices {
            if index >= RC_NUM_CHANNELS {
                return Err(invalid(format!(
                    "{} channel index {} is out of bounds (must be 0-15)",
                    name, index
                )));
            }
        }
        for (i, (name_a, a)) in indices.iter().enumerate() {
            for (name_b, b) in &indices[i + 1..] {
                if a == b {
                    return Err(invalid(format!(
                        "{} and {} cannot share channel {}",
                        name_a, name_b, a
                    )));
                }
            }
        }

        if self.maneuver.hold_time_ms == 0 || self.maneuver.hold_time_ms > 10000 {
            return Err(invalid("hold_time_ms must be between 1 and 10000"));
        }

        if self.maneuver.throttle_step == 0 {
            return Err(invalid("throttle_step must be greater than 0"));
        }

        if self.maneuver.throttle_min >= self.maneuver.throttle_max {
            return Err(invalid("throttle_min must be less than throttle_max"));
        }

        if self.maneuver.move_send_interval_ms == 0 {
            return Err(invalid("move_send_interval_ms must be greater than 0"));
        }

        if self.maneuver.move_duration_ms > 60000 {
            return Err(invalid("move_duration_ms must be at most 60000"));
        }

        Ok(())
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.msp.response_timeout_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.serial.timeout_ms)
    }
}
