//! # RC Channel State
//!
//! The 16-channel override vector sent with `MSP_SET_RAW_RC`.
//!
//! Values are microsecond pulse widths, conventionally 1000-2000 with 1500
//! as center. Nothing here range-checks them; the flight controller enforces
//! its own limits.

use std::ops::{Index, IndexMut};

use bytes::BufMut;

use crate::error::{AutoFlyError, Result};

/// Number of RC channels carried by `MSP_SET_RAW_RC`
pub const RC_NUM_CHANNELS: usize = 16;

/// Stick/switch center pulse width
pub const RC_CHANNEL_CENTER: u16 = 1500;

/// Serialized size: 16 × little-endian u16
pub const RC_PAYLOAD_SIZE: usize = RC_NUM_CHANNELS * 2;

/// Default channel indices used by the maneuvers
pub mod channels {
    /// Roll / longitudinal axis
    pub const ROLL: usize = 1;
    /// Throttle
    pub const THROTTLE: usize = 2;
    /// Yaw, held high to arm
    pub const YAW_ARM: usize = 4;
    /// Auxiliary arm switch
    pub const AUX_ARM: usize = 6;
}

/// Owned RC channel vector
///
/// # Examples
///
/// ```
/// use msp_autofly::flight::channels::{RcChannels, channels};
///
/// let mut rc = RcChannels::new();
/// rc[channels::THROTTLE] = 1000;
///
/// let payload = rc.serialize();
/// assert_eq!(payload.len(), 32);
/// assert_eq!(&payload[4..6], &1000u16.to_le_bytes());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RcChannels {
    values: [u16; RC_NUM_CHANNELS],
}

impl Default for RcChannels {
    fn default() -> Self {
        Self::new()
    }
}

impl RcChannels {
    /// All channels centered at 1500
    #[must_use]
    pub fn new() -> Self {
        Self::filled(RC_CHANNEL_CENTER)
    }

    /// All channels set to `value`
    #[must_use]
    pub fn filled(value: u16) -> Self {
        Self {
            values: [value; RC_NUM_CHANNELS],
        }
    }

    /// Build from an externally supplied list
    ///
    /// Extra entries past the sixteenth are dropped; missing ones are filled
    /// with center.
    #[must_use]
    pub fn clamp_or_pad(source: &[u16]) -> Self {
        let mut rc = Self::new();
        for (slot, &value) in rc.values.iter_mut().zip(source) {
            *slot = value;
        }
        rc
    }

    /// Set one channel
    ///
    /// # Errors
    ///
    /// Returns [`AutoFlyError::InvalidChannel`] if `index` is 16 or more
    pub fn set(&mut self, index: usize, value: u16) -> Result<()> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or(AutoFlyError::InvalidChannel(index))?;
        *slot = value;
        Ok(())
    }

    /// Read one channel, `None` if out of range
    pub fn get(&self, index: usize) -> Option<u16> {
        self.values.get(index).copied()
    }

    pub fn as_array(&self) -> &[u16; RC_NUM_CHANNELS] {
        &self.values
    }

    /// Little-endian u16 per channel, in index order
    pub fn serialize(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(RC_PAYLOAD_SIZE);
        for &value in &self.values {
            payload.put_u16_le(value);
        }
        payload
    }
}

impl Index<usize> for RcChannels {
    type Output = u16;

    fn index(&self, index: usize) -> &u16 {
        &self.values[index]
    }
}

impl IndexMut<usize> for RcChannels {
    fn index_mut(&mut self, index: usize) -> &mut u16 {
        &mut self.values[index]
    }
}
