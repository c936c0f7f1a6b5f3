//! # Serial Communication Module
//!
//! Handles the UART link to the flight controller's MSP port.
//!
//! This module handles:
//! - Opening the port at 115200 baud, 8N1, no flow control
//! - Falling back through common device paths
//! - Exposing the port through [`port_trait::SerialPortIO`]

pub mod port_trait;

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{AutoFlyError, Result};
use port_trait::{SerialPortIO, TokioSerialPort};

/// Default MSP baud rate
pub const MSP_BAUD_RATE: u32 = 115_200;

/// Flight controller device paths to try (in order of preference)
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/serial0", // Raspberry Pi primary UART
    "/dev/ttyAMA0", // Pi PL011 UART
    "/dev/ttyACM0", // USB CDC (flight controller over USB)
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// Flight controller serial port
pub struct FcSerial {
    port: TokioSerialPort<tokio_serial::SerialStream>,
    device_path: String,
}

impl std::fmt::Debug for FcSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl FcSerial {
    /// Open the flight controller port, trying the default paths
    ///
    /// # Errors
    ///
    /// Returns [`AutoFlyError::SerialPortNotFound`] if no path could be opened
    pub fn open(baud_rate: u32) -> Result<Self> {
        Self::open_with_paths(DEFAULT_DEVICE_PATHS, baud_rate)
    }

    /// Open `preferred` first, then the default paths
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use msp_autofly::serial::{FcSerial, MSP_BAUD_RATE};
    ///
    /// let serial = FcSerial::open_preferred("/dev/ttyAMA0", MSP_BAUD_RATE)?;
    /// println!("Connected to: {}", serial.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open_preferred(preferred: &str, baud_rate: u32) -> Result<Self> {
        let mut paths = vec![preferred];
        paths.extend(DEFAULT_DEVICE_PATHS.iter().filter(|&&p| p != preferred));
        Self::open_with_paths(&paths, baud_rate)
    }

    /// Open the first path in `paths` that works
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(stream) => {
                    info!("Opened flight controller at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port: TokioSerialPort::new(stream),
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(AutoFlyError::SerialPortNotFound(paths.join(", ")))
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        use tokio_serial::SerialPortBuilderExt;

        tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| AutoFlyError::Serial(format!("Failed to open {}: {}", path, e)))
    }

    /// Path of the opened device (e.g. "/dev/serial0")
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[async_trait]
impl SerialPortIO for FcSerial {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.port.flush().await
    }

    async fn read_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>> {
        self.port.read_byte(timeout).await
    }

    async fn read_bytes(&mut self, len: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        self.port.read_bytes(len, timeout).await
    }
}
