//! # MSP Frame Encoder
//!
//! Builds MSP v2 frames ready to be written to the flight controller.

use bytes::{BufMut, BytesMut};

use super::crc::crc8_dvb_s2;
use super::protocol::*;
use crate::error::Result;

/// Encode a frame for the given direction
///
/// The checksum covers everything after the preamble: flags, function id,
/// length and payload.
///
/// # Errors
///
/// Returns error if the payload is longer than 65535 bytes
pub fn encode_frame(direction: Direction, function: u16, payload: &[u8]) -> Result<Vec<u8>> {
    let frame = MspFrame::new(function, payload)?;

    let mut buf = BytesMut::with_capacity(frame.wire_size());
    buf.put_slice(&direction.preamble());
    buf.put_u8(MSP_FLAGS);
    buf.put_u16_le(frame.function);
    buf.put_u16_le(frame.payload.len() as u16);
    buf.put_slice(frame.payload);

    let crc = crc8_dvb_s2(&buf[MSP_V2_REQUEST_PREAMBLE.len()..]);
    buf.put_u8(crc);

    Ok(buf.to_vec())
}

/// Encode a request without payload (always 9 bytes)
///
/// # Examples
///
/// ```
/// use msp_autofly::msp::encoder::encode_request;
/// use msp_autofly::msp::protocol::MSP_STATUS;
///
/// let frame = encode_request(MSP_STATUS);
/// assert_eq!(frame, [b'$', b'X', b'<', 0x00, 0x65, 0x00, 0x00, 0x00, 0xCA]);
/// ```
pub fn encode_request(function: u16) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(MSP_MIN_FRAME_SIZE);
    buf.put_slice(&MSP_V2_REQUEST_PREAMBLE);
    buf.put_u8(MSP_FLAGS);
    buf.put_u16_le(function);
    buf.put_u16_le(0);

    let crc = crc8_dvb_s2(&buf[3..MSP_HEADER_SIZE]);
    buf.put_u8(crc);

    buf.to_vec()
}

/// Encode a request carrying a payload (`9 + payload.len()` bytes)
///
/// # Errors
///
/// Returns error if the payload is longer than 65535 bytes
pub fn encode_request_with_payload(function: u16, payload: &[u8]) -> Result<Vec<u8>> {
    encode_frame(Direction::Request, function, payload)
}
