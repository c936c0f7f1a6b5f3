//! # Maneuver Sequencer
//!
//! Drives the vehicle by re-sending the RC override vector at a fixed
//! cadence. Each maneuver is a bounded loop: set stick positions, send
//! `MSP_SET_RAW_RC`, sleep, repeat.
//!
//! RC overrides are not acknowledged by the flight controller. A dropped
//! frame is covered by the next iteration's re-send, so write failures are
//! logged and the loop carries on. Only [`Sequencer::check_status`] waits
//! for a reply.
//!
//! | Maneuver | Per iteration | Iterations |
//! |----------|---------------|------------|
//! | prearm | aux-arm high, throttle low | 8 |
//! | arm | yaw high, aux-arm high, throttle low | 10 |
//! | disarm | yaw low, aux-arm low, throttle low | 10 |
//! | takeoff | throttle +5 up to 1200 (starts from 1000) | 40 |
//! | land | throttle -5 down to 1000 | 40 |
//! | forward/backward | roll at power, ~20 Hz | for `duration` |

use std::time::Duration;

use tracing::{debug, info, warn};

use super::channels::RcChannels;
use crate::clock::Clock;
use crate::config::{ChannelConfig, Config, ManeuverConfig};
use crate::error::{AutoFlyError, Result};
use crate::msp::decoder::{receive_response, ReadTimeouts};
use crate::msp::encoder::{encode_request, encode_request_with_payload};
use crate::msp::protocol::{MspResponse, MSP_SET_RAW_RC, MSP_STATUS};
use crate::serial::port_trait::SerialPortIO;

/// Sole owner of the RC channel vector and the link to the flight controller
pub struct Sequencer<P, C> {
    port: P,
    clock: C,
    rc: RcChannels,
    layout: ChannelConfig,
    maneuver: ManeuverConfig,
    timeouts: ReadTimeouts,
    status_retries: u32,
}

impl<P, C> std::fmt::Debug for Sequencer<P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("rc", &self.rc)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl<P: SerialPortIO, C: Clock> Sequencer<P, C> {
    /// Create a sequencer with all channels centered
    ///
    /// # Errors
    ///
    /// Returns [`AutoFlyError::Config`] if `config` fails [`Config::validate`],
    /// e.g. a channel index outside the 16-entry override vector
    pub fn new(port: P, clock: C, config: &Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            port,
            clock,
            rc: RcChannels::filled(config.channels.center),
            layout: config.channels.clone(),
            maneuver: config.maneuver.clone(),
            timeouts: ReadTimeouts {
                response: config.response_timeout(),
                poll: config.poll_timeout(),
            },
            status_retries: config.msp.status_retries,
        })
    }

    /// Current RC channel vector
    pub fn channels(&self) -> &RcChannels {
        &self.rc
    }

    /// Number of additional status checks a gated plan may make
    pub fn status_retries(&self) -> u32 {
        self.status_retries
    }

    /// Serialize the channel vector and write it, without waiting for a reply
    async fn send_rc(&mut self) {
        let frame = match encode_request_with_payload(MSP_SET_RAW_RC, &self.rc.serialize()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode RC frame: {}", e);
                return;
            }
        };

        if let Err(e) = self.port.write_all(&frame).await {
            warn!("Failed to send RC frame: {}", e);
            return;
        }
        if let Err(e) = self.port.flush().await {
            warn!("Failed to flush serial port: {}", e);
            return;
        }

        debug!("Sent RC override {:?}", self.rc.as_array());
    }

    /// Query `MSP_STATUS` and check the reply
    ///
    /// # Errors
    ///
    /// - [`AutoFlyError::Serial`] if the request cannot be written
    /// - [`AutoFlyError::NoResponse`] / [`AutoFlyError::ChecksumMismatch`] from decoding
    /// - [`AutoFlyError::UnexpectedFunction`] if the reply answers something else
    pub async fn status(&mut self) -> Result<MspResponse> {
        let request = encode_request(MSP_STATUS);

        self.port.write_all(&request).await
            .map_err(|e| AutoFlyError::Serial(format!("Failed to write status request: {}", e)))?;
        self.port.flush().await
            .map_err(|e| AutoFlyError::Serial(format!("Failed to flush serial port: {}", e)))?;

        let response = receive_response(&mut self.port, &self.clock, self.timeouts).await?;

        if response.function != MSP_STATUS {
            return Err(AutoFlyError::UnexpectedFunction {
                expected: MSP_STATUS,
                received: response.function,
            });
        }

        Ok(response)
    }

    /// One status round-trip; `true` iff a valid `MSP_STATUS` reply came back
    pub async fn check_status(&mut self) -> bool {
        info!("Checking flight controller status");

        match self.status().await {
            Ok(response) => {
                info!("Status OK ({} byte payload)", response.payload.len());
                true
            }
            Err(e) => {
                warn!("Status check failed: {}", e);
                false
            }
        }
    }

    /// Apply fixed stick positions and send them `repeat` times
    async fn hold_positions(&mut self, repeat: u32, positions: &[(usize, u16)]) {
        let hold_time = self.maneuver.hold_time();

        for _ in 0..repeat {
            for &(channel, value) in positions {
                self.rc[channel] = value;
            }
            self.send_rc().await;
            self.clock.sleep(hold_time).await;
        }
    }

    /// Aux-arm high with throttle at minimum
    pub async fn prearm(&mut self) {
        info!("Prearm");
        let positions = [
            (self.layout.aux_arm, self.maneuver.arm_high),
            (self.layout.throttle, self.maneuver.throttle_min),
        ];
        self.hold_positions(self.maneuver.prearm_repeat, &positions).await;
    }

    /// Yaw and aux-arm high with throttle at minimum
    pub async fn arm(&mut self) {
        info!("Arming");
        let positions = [
            (self.layout.yaw, self.maneuver.arm_high),
            (self.layout.aux_arm, self.maneuver.arm_high),
            (self.layout.throttle, self.maneuver.throttle_min),
        ];
        self.hold_positions(self.maneuver.arm_repeat, &positions).await;
    }

    /// Yaw and aux-arm low with throttle at minimum
    pub async fn disarm(&mut self) {
        info!("Disarming");
        let positions = [
            (self.layout.yaw, self.maneuver.arm_low),
            (self.layout.aux_arm, self.maneuver.arm_low),
            (self.layout.throttle, self.maneuver.throttle_min),
        ];
        self.hold_positions(self.maneuver.disarm_repeat, &positions).await;
    }

    /// Ramp throttle up from the minimum, capped at `throttle_max`
    pub async fn throttle_up(&mut self) {
        let throttle = self.layout.throttle;
        let (step, max) = (self.maneuver.throttle_step, self.maneuver.throttle_max);
        let hold_time = self.maneuver.hold_time();

        self.rc[throttle] = self.maneuver.throttle_min;
        for _ in 0..self.maneuver.ramp_repeat {
            if self.rc[throttle] < max {
                self.rc[throttle] = self.rc[throttle].saturating_add(step).min(max);
            }
            self.send_rc().await;
            self.clock.sleep(hold_time).await;
        }

        debug!("Throttle ramp up finished at {}", self.rc[throttle]);
    }

    /// Ramp throttle down, floored at `throttle_min`
    pub async fn throttle_down(&mut self) {
        let throttle = self.layout.throttle;
        let (step, min) = (self.maneuver.throttle_step, self.maneuver.throttle_min);
        let hold_time = self.maneuver.hold_time();

        for _ in 0..self.maneuver.ramp_repeat {
            if self.rc[throttle] > min {
                self.rc[throttle] = self.rc[throttle].saturating_sub(step).max(min);
            }
            self.send_rc().await;
            self.clock.sleep(hold_time).await;
        }

        debug!("Throttle ramp down finished at {}", self.rc[throttle]);
    }

    pub async fn takeoff(&mut self) {
        info!("Takeoff");
        self.throttle_up().await;
    }

    pub async fn land(&mut self) {
        info!("Landing");
        self.throttle_down().await;
    }

    /// Fly forward: hold roll at `power` (above center) for `duration`,
    /// then re-center it
    pub async fn move_forward(&mut self, power: u16, duration: Duration) {
        info!("Moving forward (power {}, {:?})", power, duration);
        self.translate(power, duration).await;
    }

    /// Fly backward: hold roll at `power` (below center) for `duration`,
    /// then re-center it
    pub async fn move_backward(&mut self, power: u16, duration: Duration) {
        info!("Moving backward (power {}, {:?})", power, duration);
        self.translate(power, duration).await;
    }

    /// `move_forward` with the configured power and duration
    pub async fn forward(&mut self) {
        let (power, duration) = (self.maneuver.forward_power, self.maneuver.move_duration());
        self.move_forward(power, duration).await;
    }

    /// `move_backward` with the configured power and duration
    pub async fn backward(&mut self) {
        let (power, duration) = (self.maneuver.backward_power, self.maneuver.move_duration());
        self.move_backward(power, duration).await;
    }

    async fn translate(&mut self, power: u16, duration: Duration) {
        let roll = self.layout.roll;
        let interval = self.maneuver.move_send_interval();

        match self.clock.now().checked_add(duration) {
            Some(end) => {
                self.rc[roll] = power;
                while self.clock.now() < end {
                    self.send_rc().await;
                    self.clock.sleep(interval).await;
                }
            }
            None => warn!("Move duration {:?} is out of range, not moving", duration),
        }

        // Always leave the axis centered, however many sends happened
        self.rc[roll] = self.layout.center;
        self.send_rc().await;
    }
}
