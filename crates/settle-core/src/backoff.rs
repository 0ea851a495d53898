//! Exponential backoff for retried mutations

use std::time::Duration;

/// Exponential backoff configuration
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for each subsequent retry
    pub multiplier: f64,
    /// Random jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl BackoffConfig {
    /// Backoff without randomness, for predictable schedules
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Calculate the backoff delay for a given retry attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_secs =
            self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt.min(32) as i32);
        // A negative multiplier flips the sign on odd attempts.
        let capped_secs = base_secs.min(self.max_delay.as_secs_f64()).max(0.0);

        let jitter_factor = self.jitter.min(1.0);
        let delay_secs = if jitter_factor > 0.0 {
            let jitter_range = capped_secs * jitter_factor;
            let jitter = rand::random::<f64>() * jitter_range * 2.0 - jitter_range;
            capped_secs + jitter
        } else {
            capped_secs
        };

        Duration::from_secs_f64(delay_secs.max(0.0))
    }

    /// Delay for `attempt`, never exceeding `remaining`
    pub fn bounded_delay(&self, attempt: u32, remaining: Duration) -> Duration {
        self.delay_for_attempt(attempt).min(remaining)
    }
}
