use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded exponential backoff applied to transient step failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_delay_ms: u64,

    /// Growth factor between consecutive delays
    pub backoff_multiplier: f64,

    /// Upper bound for a single delay
    pub max_delay_ms: u64,

    /// Fraction of the delay used as random spread
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Policy with a fixed small delay, handy for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay_ms: 1,
            backoff_multiplier: 1.0,
            max_delay_ms: 1,
            jitter_factor: 0.0,
        }
    }

    /// Delay to wait after `attempt` (1-based) failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as f64;
        let base_delay_ms = (self.initial_delay_ms as f64 * self.backoff_multiplier.powf(exponent))
            .min(self.max_delay_ms as f64) as u64;

        // Spread retries of concurrent instances apart
        let jitter_range = (base_delay_ms as f64 * self.jitter_factor) as i64;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(-jitter_range / 2..=jitter_range / 2)
        } else {
            0
        };

        Duration::from_millis((base_delay_ms as i64 + jitter).max(1) as u64)
    }
}
