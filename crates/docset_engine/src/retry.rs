use std::fmt;
use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};

use crate::{FetchError, FetchOutput, Fetcher};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// The wait after attempt `n` is `n * base_delay`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetriedFetch {
    pub output: FetchOutput,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub attempts: u32,
    pub last_error: FetchError,
}

impl fmt::Display for RetryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.last_error.is_retryable() {
            write!(f, "failed after {} attempts: {}", self.attempts, self.last_error)
        } else {
            write!(f, "{}", self.last_error)
        }
    }
}

impl std::error::Error for RetryFailure {}

/// Fetches `url`, retrying transient failures with linearly growing delays.
///
/// Non-retryable failures (4xx and friends) end the loop after one attempt.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: &str,
    policy: &RetryPolicy,
) -> Result<RetriedFetch, RetryFailure> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let last_error = match fetcher.fetch(url).await {
            Ok(output) => {
                return Ok(RetriedFetch {
                    output,
                    attempts: attempt,
                })
            }
            Err(err) => err,
        };

        if !last_error.is_retryable() || attempt >= max_attempts {
            engine_warn!("Giving up on {} after attempt {}: {}", url, attempt, last_error);
            return Err(RetryFailure {
                attempts: attempt,
                last_error,
            });
        }

        let delay = policy.delay_after(attempt);
        engine_debug!(
            "Attempt {}/{} for {} failed ({}), retrying in {:?}",
            attempt,
            max_attempts,
            url,
            last_error,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}
