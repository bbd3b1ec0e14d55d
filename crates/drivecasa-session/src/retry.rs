//! Startup retry policy.

use std::time::Duration;

use drivecasa_core::config::{DEFAULT_MAX_ATTEMPTS, DEFAULT_STARTUP_TIMEOUT_SECS};

/// How many times to launch the tool, and how long each launch has to show
/// its first prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total launches; zero behaves as one.
    pub max_attempts: u32,
    pub startup_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_secs_f64(DEFAULT_STARTUP_TIMEOUT_SECS),
        )
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, startup_timeout: Duration) -> Self {
        Self {
            max_attempts,
            startup_timeout,
        }
    }

    /// A single attempt.
    #[must_use]
    pub const fn once(startup_timeout: Duration) -> Self {
        Self::new(1, startup_timeout)
    }

    /// Attempt numbers, starting at one.
    pub fn attempts(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.max_attempts.max(1)
    }
}
