//! Bounded connect retries with exponential backoff.

use std::time::Duration;

/// How [`CommandClient::connect_with_retry`](super::CommandClient::connect_with_retry)
/// retries a failed connect.
///
/// Attempt `n` (1-based) that fails is followed by a sleep of
/// `initial_delay * multiplier^(n-1)`, capped at `max_delay`.  Retrying stops
/// after `max_attempts` attempts, or earlier when the next attempt could not
/// start before `deadline` has elapsed since the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of connect attempts, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
    /// Hard limit on the whole connect sequence.
    pub deadline: Duration,
    /// Limit on a single connect attempt.
    pub connect_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2,
            deadline: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sleep after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}
