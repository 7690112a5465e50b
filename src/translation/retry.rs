/*!
 * Retry and backoff policy for backend calls.
 *
 * Errors classify themselves through `TranslationError::is_retryable`; this
 * module only decides how often and how long to wait.
 */

use log::{error, warn};
use std::future::Future;
use std::time::Duration;

use crate::app_config::TranslationCommonConfig;
use crate::errors::TranslationError;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per operation, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(common: &TranslationCommonConfig) -> Self {
        Self::new(
            common.retry_count,
            Duration::from_millis(common.retry_backoff_ms),
            Duration::from_millis(common.retry_backoff_cap_ms),
        )
    }

    /// Delay before retry `retry` (1-based): `min(base * 2^(retry-1), cap)`
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
    ///
    /// The closure receives the 1-based attempt number. Exhaustion wraps the last
    /// error in `TranslationError::RetriesExhausted`.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, TranslationError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TranslationError>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => {
                    error!("{} failed with non-retryable error: {}", label, e);
                    return Err(e);
                }
                Err(e) if attempt >= self.max_attempts => {
                    error!("{} failed after {} attempts: {}", label, attempt, e);
                    return Err(TranslationError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.delay_for_retry(attempt);
                    warn!(
                        "{} attempt {}/{} failed: {} - retrying in {:?}",
                        label, attempt, self.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
