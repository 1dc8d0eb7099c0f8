//! Bounded fixed-delay retry.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{Error, Result};
use crate::limits::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};

/// Retry policy: attempt count (including the first) and fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
///
/// Exhaustion is reported as `RetriesExhausted` wrapping the last error.
/// `on_retry` is called with the failed attempt number before each sleep.
pub async fn retry<T, F, Fut, R>(
    policy: RetryPolicy,
    op_name: &str,
    mut op: F,
    mut on_retry: R,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    R: FnMut(u32, &Error),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !err.is_retryable() {
            return Err(err);
        }

        if attempt >= max_attempts {
            return Err(Error::RetriesExhausted {
                attempts: attempt,
                last: Box::new(err),
            });
        }

        warn!(
            op = op_name,
            attempt = attempt,
            max_attempts = max_attempts,
            delay_ms = %policy.delay.as_millis(),
            error = %err,
            "Retrying"
        );
        on_retry(attempt, &err);
        tokio::time::sleep(policy.delay).await;
    }
}
