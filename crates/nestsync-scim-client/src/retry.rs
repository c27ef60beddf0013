//! Exponential backoff for SCIM reads.

use crate::error::{ScimClientError, ScimClientResult};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times, and how patiently, a failed request is retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 disables retrying).
    pub max_retries: u32,
    /// First backoff step; doubled on every further attempt.
    pub base_delay: Duration,
    /// Upper bound for any single wait, including `Retry-After`.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with a 60 second cap.
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Whether `error` at `attempt` (0-based) warrants another try.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &ScimClientError) -> bool {
        attempt < self.max_retries && (error.is_retryable() || error.is_server_error())
    }

    /// Wait before the next attempt: `Retry-After` when the target sent one, else
    /// `base * 2^attempt`. Both are capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &ScimClientError) -> Duration {
        let delay = match error {
            ScimClientError::RateLimited {
                retry_after_secs: Some(secs),
            } => Duration::from_secs(*secs),
            _ => self
                .base_delay
                .saturating_mul(2u32.saturating_pow(attempt.min(31))),
        };
        delay.min(self.max_delay)
    }

    /// Runs `f` until it succeeds, fails with a non-retryable error, or the retry budget
    /// is spent (`MaxRetriesExceeded`).
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut f: F) -> ScimClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ScimClientResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let error = match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempts = attempt + 1, "Succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !self.should_retry(attempt, &error) {
                let transient = error.is_retryable() || error.is_server_error();
                if transient && attempt > 0 {
                    warn!(operation, attempts = attempt + 1, error = %error, "Giving up after retries");
                    return Err(ScimClientError::MaxRetriesExceeded {
                        attempts: attempt + 1,
                        message: format!("{operation}: {error}"),
                    });
                }
                return Err(error);
            }

            let delay = self.delay_for(attempt, &error);
            debug!(
                operation,
                attempt = attempt + 1,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying after transient error"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
