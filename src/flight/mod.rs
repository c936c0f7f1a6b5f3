//! # Flight Module
//!
//! Scripted flight on top of the MSP link.
//!
//! This module handles:
//! - The 16-channel RC override vector
//! - Timed maneuver loops (arm, takeoff, translate, land, disarm)
//! - Composite flight plans gated on a status check

pub mod channels;
pub mod sequencer;
pub mod plan;
