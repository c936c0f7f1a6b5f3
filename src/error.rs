//! # Error Types
//!
//! Custom error types for MSP Autofly using `thiserror`.

use thiserror::Error;

/// Main error type for MSP Autofly
#[derive(Debug, Error)]
pub enum AutoFlyError {
    /// MSP framing errors (short frame, bad preamble, oversized payload)
    #[error("MSP protocol error: {0}")]
    Protocol(String),

    /// Flight controller did not produce a complete frame in time
    #[error("No response from flight controller")]
    NoResponse,

    /// Trailing checksum byte does not match the computed CRC
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{received:02X}")]
    ChecksumMismatch { expected: u8, received: u8 },

    /// Response carried a different function id than the request
    #[error("Unexpected function id: expected {expected}, got {received}")]
    UnexpectedFunction { expected: u16, received: u16 },

    /// RC channel index outside 0-15
    #[error("RC channel index {0} is out of range (must be 0-15)")]
    InvalidChannel(usize),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate device paths could be opened
    #[error("No flight controller found (tried: {0})")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for MSP Autofly
pub type Result<T> = std::result::Result<T, AutoFlyError>;
