//! # MSP Autofly Library
//!
//! Fly a multirotor through scripted maneuvers by overriding its RC channels
//! over MSP v2 on a serial link.
//!
//! This library provides the MSP v2 codec, the transport and clock
//! abstractions it runs on, and the maneuver sequencer that turns
//! "arm, take off, move, land" into a steady stream of RC override frames.

pub mod config;
pub mod error;
pub mod clock;
pub mod msp;
pub mod flight;
pub mod serial;
