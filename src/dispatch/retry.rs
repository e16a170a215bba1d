//! Bounded retry with fixed backoff

use crate::api::ApiError;
use std::future::Future;
use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// How many times a completion is attempted and how long to wait between
/// attempts. The delay is fixed; it does not grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// The error that ended a retry sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    /// Attempts actually made
    pub attempts: u32,
    pub error: ApiError,
}

impl RetryFailure {
    /// Whether the loop stopped because the budget ran out rather than on a
    /// terminal error
    pub fn exhausted(&self) -> bool {
        self.error.is_retryable()
    }
}

/// Call `attempt` until it succeeds, fails terminally, or the budget is
/// spent. `attempt` receives the 1-based attempt number.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut attempt: F) -> Result<T, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut number = 1;
    loop {
        match attempt(number).await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_retryable() && number < max_attempts => {
                tracing::warn!(
                    attempt = number,
                    max_attempts,
                    status = ?error.status,
                    error = %error.message,
                    backoff_ms = %policy.backoff.as_millis(),
                    "Retryable failure, backing off"
                );
                tokio::time::sleep(policy.backoff).await;
                number += 1;
            }
            Err(error) => {
                return Err(RetryFailure {
                    attempts: number,
                    error,
                })
            }
        }
    }
}
