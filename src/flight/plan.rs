//! # Flight Plans
//!
//! Fixed maneuver sequences, each gated on a successful status check.
//!
//! The gate is the one safety rule enforced here: if the flight controller
//! never answers `MSP_STATUS` correctly, no RC override frame is written.

use std::fmt;

use tracing::{info, warn};

use super::sequencer::Sequencer;
use crate::clock::Clock;
use crate::error::Result;
use crate::serial::port_trait::SerialPortIO;

/// Single step of a flight plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maneuver {
    Prearm,
    Arm,
    Takeoff,
    MoveForward,
    MoveBackward,
    Land,
    Disarm,
}

/// Composite maneuver sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightPlan {
    /// Prearm, arm, disarm; props should stay idle
    ArmTest,
    /// Arm, ramp throttle up and back down, disarm
    TakeoffLand,
    /// Takeoff, forward, backward, land
    Pattern,
}

impl FlightPlan {
    /// Maneuvers run after the status gate, in order
    pub fn steps(self) -> &'static [Maneuver] {
        use Maneuver::*;

        match self {
            FlightPlan::ArmTest => &[Prearm, Arm, Disarm],
            FlightPlan::TakeoffLand => &[Prearm, Arm, Takeoff, Land, Disarm],
            FlightPlan::Pattern => &[
                Prearm,
                Arm,
                Takeoff,
                MoveForward,
                MoveBackward,
                Land,
                Disarm,
            ],
        }
    }
}

impl fmt::Display for FlightPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlightPlan::ArmTest => "arm test",
            FlightPlan::TakeoffLand => "takeoff + land",
            FlightPlan::Pattern => "forward/backward pattern",
        };
        f.write_str(name)
    }
}

impl<P: SerialPortIO, C: Clock> Sequencer<P, C> {
    /// Run one maneuver with its configured defaults
    pub async fn perform(&mut self, maneuver: Maneuver) {
        match maneuver {
            Maneuver::Prearm => self.prearm().await,
            Maneuver::Arm => self.arm().await,
            Maneuver::Takeoff => self.takeoff().await,
            Maneuver::MoveForward => self.forward().await,
            Maneuver::MoveBackward => self.backward().await,
            Maneuver::Land => self.land().await,
            Maneuver::Disarm => self.disarm().await,
        }
    }

    /// Status check with up to `status_retries` extra attempts
    ///
    /// # Errors
    ///
    /// Returns the error of the last failed attempt.
    pub async fn status_gate(&mut self) -> Result<()> {
        let attempts = self.status_retries() + 1;
        let mut attempt = 1;

        loop {
            match self.status().await {
                Ok(_) => {
                    info!("Status OK");
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    warn!("Status check {}/{} failed: {}, retrying", attempt, attempts, e);
                    attempt += 1;
                }
                Err(e) => {
                    warn!("Status check {}/{} failed: {}", attempt, attempts, e);
                    return Err(e);
                }
            }
        }
    }

    /// Run a flight plan behind the status gate
    ///
    /// # Errors
    ///
    /// Returns the status-check error if the gate fails; nothing is actuated
    /// in that case. Once the gate passes the plan runs to completion.
    pub async fn run_plan(&mut self, plan: FlightPlan) -> Result<()> {
        info!("Starting flight plan: {}", plan);

        if let Err(e) = self.status_gate().await {
            warn!("Aborting {} before actuation", plan);
            return Err(e);
        }

        for &maneuver in plan.steps() {
            self.perform(maneuver).await;
        }

        info!("Flight plan complete: {}", plan);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::mocks::MockClock;
    use crate::config::Config;
    use crate::error::AutoFlyError;
    use crate::flight::channels::channels;
    use crate::msp::encoder::{encode_frame, encode_request};
    use crate::msp::protocol::{Direction, MSP_RC, MSP_SET_RAW_RC, MSP_STATUS};
    use crate::serial::port_trait::mocks::MockSerialPort;

    fn sequencer_with(config: &Config) -> (Sequencer<MockSerialPort, MockClock>, MockSerialPort) {
        let clock = MockClock::new();
        let port = MockSerialPort::with_clock(clock.clone());
        (Sequencer::new(port.clone(), clock, config).unwrap(), port)
    }

    fn status_ok() -> Vec<u8> {
        encode_frame(Direction::Response, MSP_STATUS, &[0x01, 0x02]).unwrap()
    }

    fn rc_frame_count(port: &MockSerialPort) -> usize {
        port.get_written_data()
            .iter()
            .filter(|frame| u16::from_le_bytes([frame[4], frame[5]]) == MSP_SET_RAW_RC)
            .count()
    }

    #[test]
    fn test_plan_steps() {
        assert_eq!(
            FlightPlan::ArmTest.steps(),
            &[Maneuver::Prearm, Maneuver::Arm, Maneuver::Disarm]
        );
        assert_eq!(FlightPlan::TakeoffLand.steps().len(), 5);
        assert_eq!(FlightPlan::Pattern.steps().first(), Some(&Maneuver::Prearm));
        assert_eq!(FlightPlan::Pattern.steps().last(), Some(&Maneuver::Disarm));
    }

    #[tokio::test]
    async fn test_gate_failure_sends_no_rc_frames() {
        let (mut seq, port) = sequencer_with(&Config::default());

        let result = seq.run_plan(FlightPlan::Pattern).await;

        assert!(matches!(result, Err(AutoFlyError::NoResponse)));
        assert_eq!(port.get_written_data(), vec![encode_request(MSP_STATUS)]);
    }

    #[tokio::test]
    async fn test_wrong_function_aborts_before_actuation() {
        let (mut seq, port) = sequencer_with(&Config::default());
        port.queue_reply(&encode_frame(Direction::Response, MSP_RC, &[]).unwrap());

        let result = seq.run_plan(FlightPlan::ArmTest).await;

        assert!(matches!(result, Err(AutoFlyError::UnexpectedFunction { .. })));
        assert_eq!(rc_frame_count(&port), 0);
    }

    #[tokio::test]
    async fn test_arm_test_plan() {
        let (mut seq, port) = sequencer_with(&Config::default());
        port.queue_reply(&status_ok());

        seq.run_plan(FlightPlan::ArmTest).await.unwrap();

        assert_eq!(rc_frame_count(&port), 8 + 10 + 10);
        assert_eq!(seq.channels()[channels::YAW_ARM], 1100);
        assert_eq!(seq.channels()[channels::AUX_ARM], 1100);
    }

    #[tokio::test]
    async fn test_takeoff_land_plan() {
        let (mut seq, port) = sequencer_with(&Config::default());
        port.queue_reply(&status_ok());

        seq.run_plan(FlightPlan::TakeoffLand).await.unwrap();

        assert_eq!(rc_frame_count(&port), 8 + 10 + 40 + 40 + 10);
        assert_eq!(seq.channels()[channels::THROTTLE], 1000);
    }

    #[tokio::test]
    async fn test_pattern_plan_recenters_roll() {
        let (mut seq, port) = sequencer_with(&Config::default());
        port.queue_reply(&status_ok());

        seq.run_plan(FlightPlan::Pattern).await.unwrap();

        // 21 frames per 1 s translate at 20 Hz (including the re-center)
        assert_eq!(rc_frame_count(&port), 8 + 10 + 40 + 21 + 21 + 40 + 10);
        assert_eq!(seq.channels()[channels::ROLL], 1500);
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let (mut seq, port) = sequencer_with(&Config::default());
        port.queue_reply(&[]);
        port.queue_reply(&status_ok());

        assert!(seq.status_gate().await.is_err());
        assert_eq!(port.get_written_data().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_dropped_reply() {
        let mut config = Config::default();
        config.msp.status_retries = 2;
        let (mut seq, port) = sequencer_with(&config);
        port.queue_reply(&[]);
        port.queue_reply(&status_ok());

        seq.run_plan(FlightPlan::ArmTest).await.unwrap();

        let written = port.get_written_data();
        assert_eq!(written[0], encode_request(MSP_STATUS));
        assert_eq!(written[1], encode_request(MSP_STATUS));
        assert_eq!(rc_frame_count(&port), 28);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let mut config = Config::default();
        config.msp.status_retries = 2;
        let (mut seq, port) = sequencer_with(&config);

        assert!(seq.run_plan(FlightPlan::TakeoffLand).await.is_err());
        assert_eq!(port.get_written_data().len(), 3);
        assert_eq!(rc_frame_count(&port), 0);
    }
}
