//! # MSP Protocol Module
//!
//! Implementation of the MultiWii Serial Protocol, version 2 (MSP v2), as
//! spoken by Betaflight/INAV flight controllers over a UART.
//!
//! This module handles:
//! - Request frame encoding (with and without payload)
//! - Response frame scanning, reading and parsing from a byte stream
//! - CRC8-DVB-S2 checksum calculation and verification

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod crc;
