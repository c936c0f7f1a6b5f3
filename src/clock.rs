//! # Clock Abstraction
//!
//! Monotonic time and sleeping behind a trait, so that maneuver cadence and
//! response timeouts can be driven by virtual time in tests.

use async_trait::async_trait;
use std::time::Duration;

/// Source of monotonic time and delays
#[async_trait]
pub trait Clock: Send {
    /// Time elapsed since the clock was created
    fn now(&self) -> Duration;

    /// Suspend the caller for `duration`
    async fn sleep(&mut self, duration: Duration);
}

/// Wall clock backed by `tokio::time`
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
