/*!
 * Per-call timeout and retry with exponential backoff.
 */

use log::debug;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::app_config::RunnerConfig;
use crate::errors::{ProviderError, TranslationError};

/// How a single backend call is bounded and retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retry_count: u32,
    /// Backoff before the first retry; doubles on each further retry
    pub backoff_base: Duration,
    /// Upper bound on one call
    pub call_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(retry_count: u32, backoff_base: Duration, call_timeout: Duration) -> Self {
        Self {
            retry_count,
            backoff_base,
            call_timeout,
        }
    }

    pub fn from_config(runner: &RunnerConfig, timeout_secs: u64) -> Self {
        Self::new(
            runner.retry_count,
            Duration::from_millis(runner.retry_backoff_ms),
            Duration::from_secs(timeout_secs.max(1)),
        )
    }

    /// Deterministic part of the delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << exponent)
    }

    /// Backoff plus up to 10% random jitter
    fn jittered_backoff(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        let spread = (delay.as_millis() / 10) as u64;
        if spread == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::rng().random_range(0..=spread))
    }

    /// Run `call` until it succeeds, fails permanently, or retries run out.
    /// A call exceeding `call_timeout` counts as a transient failure.
    pub async fn run<F, Fut>(&self, mut call: F) -> Result<String, TranslationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, TranslationError>>,
    {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.call_timeout).into()),
            };

            match result {
                Ok(text) => return Ok(text),
                Err(error) if error.is_transient() && attempt < self.retry_count => {
                    attempt += 1;
                    let delay = self.jittered_backoff(attempt);
                    debug!(
                        "Transient failure ({}), retry {}/{} in {:?}",
                        error, attempt, self.retry_count, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000), Duration::from_secs(30))
    }
}
