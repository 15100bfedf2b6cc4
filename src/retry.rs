//! Session-Creation Retry Policy
//!
//! Pure backoff arithmetic; governs only session creation. A failed poll
//! is reported as non-leader and retried on the next scheduled tick, never
//! in a tight loop.

use std::time::Duration;

use crate::config::RetryConfig;

/// Retry policy for session creation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts
    pub max_tries: u32,
    /// Base retry period in seconds
    pub base_period_secs: f64,
    /// Backoff multiplier applied per attempt
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: 5,
            base_period_secs: 2.0,
            backoff_multiplier: 1.5,
        }
    }
}

impl RetryPolicy {
    /// Compute the delay to sleep after attempt `attempt` (0-based) fails.
    ///
    /// `base * (attempt + 1) * max(1, attempt * multiplier)`: flat for the
    /// first attempts, multiplicative growth afterwards. Deterministic,
    /// no jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let growth = (attempt as f64 * self.backoff_multiplier).max(1.0);
        let secs = self.base_period_secs * (attempt as f64 + 1.0) * growth;
        Duration::from_secs_f64(secs)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_tries: config.max_tries,
            base_period_secs: config.base_period_secs,
            backoff_multiplier: config.backoff_multiplier,
        }
    }
}
