//! Retry configuration for conflicting transactions
//!
//! A failed commit is restarted from scratch. Between attempts the worker
//! backs off exponentially so that transactions contending on the same cells
//! spread out instead of colliding again immediately.
//!
//! ```text
//! delay(attempt) = min(base_delay_ms * 2^attempt, max_delay_ms)
//! with jitter:    uniform in [delay / 2, delay]
//! ```

use crate::error::{StmError, StmResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cap on the exponent so the shift cannot overflow
const MAX_BACKOFF_EXPONENT: u32 = 20;

/// Retry policy for `run_in_transaction`
///
/// # Example
///
/// ```
/// use strata_stm_core::RetryConfig;
///
/// let config = RetryConfig::default()
///     .with_max_retries(200)
///     .with_base_delay_ms(1)
///     .with_max_delay_ms(50);
/// assert_eq!(config.max_retries, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts allowed after the first one
    pub max_retries: u32,
    /// Delay before the first retry, zero disables sleeping
    pub base_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
    /// Randomise each delay within `[delay / 2, delay]`
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 10,
            base_delay_ms: 1,
            max_delay_ms: 50,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Retry immediately, without sleeping between attempts
    pub fn no_delay(max_retries: u32) -> Self {
        RetryConfig {
            max_retries,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter: false,
        }
    }

    /// Set the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial backoff
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set the backoff ceiling
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total attempts, counting the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Reject configurations whose ceiling is below their base delay
    pub fn validate(&self) -> StmResult<()> {
        if self.max_delay_ms < self.base_delay_ms {
            return Err(StmError::invalid_argument(format!(
                "max_delay_ms ({}) is below base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        Ok(())
    }

    /// Exponential delay before retry number `attempt` (0-based), without jitter
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(MAX_BACKOFF_EXPONENT);
        let millis = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    /// Delay to wait before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        if !self.jitter || ceiling.is_zero() {
            return ceiling;
        }
        let micros = ceiling.as_micros() as u64;
        Duration::from_micros(rand::thread_rng().gen_range(micros / 2..=micros))
    }
}
