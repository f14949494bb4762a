//! Exponential reconnect backoff.

use std::time::Duration;

/// Backoff policy settings.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
    /// Growth factor applied per consecutive failure
    pub multiplier: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

/// Exponential backoff with a capped maximum delay and no retry limit.
///
/// Successive delays are non-decreasing up to `max_delay`. `reset` returns
/// the policy to `initial_delay`, which the Connection Manager does after
/// every successful connect.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Number of delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay for the next retry; advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.exponential_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Calculate exponential backoff delay.
    fn exponential_delay(&self, n_attempts: u32) -> Duration {
        let factor = f64::from(self.config.multiplier.max(1)).powi(n_attempts.min(64) as i32);
        let delay = self.config.initial_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.config.max_delay.as_secs_f64()))
    }
}
