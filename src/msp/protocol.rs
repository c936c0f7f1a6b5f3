//! # MSP v2 Protocol Constants and Types
//!
//! Core protocol definitions for MSP v2 communication.
//!
//! ## Frame Layout
//!
//! ```text
//! offset 0..3   preamble "$X<" (request) or "$X>" (response)
//! offset 3      flags (always 0x00)
//! offset 4..6   function id, little-endian u16
//! offset 6..8   payload length, little-endian u16
//! offset 8..8+N payload
//! offset 8+N    CRC8-DVB-S2 over bytes [3, 8+N)
//! ```

use crate::error::{AutoFlyError, Result};

/// Request preamble (host -> flight controller)
pub const MSP_V2_REQUEST_PREAMBLE: [u8; 3] = *b"$X<";

/// Response preamble (flight controller -> host)
pub const MSP_V2_RESPONSE_PREAMBLE: [u8; 3] = *b"$X>";

/// Flags byte, unused by this command set
pub const MSP_FLAGS: u8 = 0x00;

/// Header size: preamble(3) + flags(1) + function(2) + length(2)
pub const MSP_HEADER_SIZE: usize = 8;

/// Smallest possible frame: header + checksum with an empty payload
pub const MSP_MIN_FRAME_SIZE: usize = MSP_HEADER_SIZE + 1;

/// Largest payload the 16-bit length field can describe
pub const MSP_MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Controller status (cycle time, sensors, flight mode flags)
pub const MSP_STATUS: u16 = 101;

/// Raw accelerometer / gyro / magnetometer readings
pub const MSP_RAW_IMU: u16 = 102;

/// Current RC channel values as seen by the controller
pub const MSP_RC: u16 = 105;

/// GPS fix, position and speed
pub const MSP_RAW_GPS: u16 = 107;

/// Estimated altitude and vario
pub const MSP_ALTITUDE: u16 = 109;

/// RC channel override (payload = 16 × little-endian u16)
pub const MSP_SET_RAW_RC: u16 = 200;

/// Frame direction, selecting the preamble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to flight controller (`$X<`)
    Request,
    /// Flight controller to host (`$X>`)
    Response,
}

impl Direction {
    /// Preamble bytes for this direction
    pub fn preamble(self) -> [u8; 3] {
        match self {
            Direction::Request => MSP_V2_REQUEST_PREAMBLE,
            Direction::Response => MSP_V2_RESPONSE_PREAMBLE,
        }
    }
}

/// MSP frame contents, without preamble or checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MspFrame<'a> {
    /// Function id
    pub function: u16,

    /// Payload data
    pub payload: &'a [u8],
}

impl<'a> MspFrame<'a> {
    /// Create a new MSP frame
    ///
    /// # Errors
    ///
    /// Returns error if the payload does not fit the 16-bit length field
    pub fn new(function: u16, payload: &'a [u8]) -> Result<Self> {
        if payload.len() > MSP_MAX_PAYLOAD_SIZE {
            return Err(AutoFlyError::Protocol(
                format!("Payload size {} exceeds maximum {}", payload.len(), MSP_MAX_PAYLOAD_SIZE)
            ));
        }

        Ok(Self { function, payload })
    }

    /// Total size on the wire (header + payload + checksum)
    pub fn wire_size(&self) -> usize {
        MSP_MIN_FRAME_SIZE + self.payload.len()
    }
}

/// Decoded response from the flight controller.
///
/// The payload is kept raw; interpreting it is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MspResponse {
    /// Function id echoed by the controller
    pub function: u16,

    /// Raw payload bytes
    pub payload: Vec<u8>,
}
