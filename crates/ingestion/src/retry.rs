//! Bounded retry for flaky transports

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{error, trace};

/// Boxed future borrowing the retried state
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Fixed-delay retry policy
///
/// Every failed attempt waits `delay` before the next one. The policy knows
/// nothing about the operation it wraps.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts per call (at least 1)
    pub max_attempts: u32,
    /// Delay after a failed attempt
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 500,
            delay: Duration::from_millis(100),
        }
    }
}

/// Result of one retried call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome<T> {
    /// Successful value, `None` once the budget is exhausted
    pub value: Option<T>,
    /// Attempts made
    pub attempts: u32,
    /// Failed attempts
    pub failures: u32,
}

impl<T> RetryOutcome<T> {
    /// Failed attempts over total attempts, truncated to a whole percent
    pub fn error_rate_percent(&self) -> u32 {
        if self.attempts == 0 {
            0
        } else {
            self.failures * 100 / self.attempts
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.value.is_none()
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Call `op` on `state` until it succeeds or the budget runs out
    ///
    /// Exhaustion is not an error for the caller: the outcome carries no
    /// value and the error rate is logged together with the last error.
    pub async fn call<S, T, E, F>(&self, operation: &str, state: &mut S, mut op: F) -> RetryOutcome<T>
    where
        S: ?Sized,
        E: Display,
        F: for<'a> FnMut(&'a mut S) -> BoxFuture<'a, Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempts = 0;
        let mut failures = 0;

        loop {
            attempts += 1;
            match op(state).await {
                Ok(value) => {
                    return RetryOutcome {
                        value: Some(value),
                        attempts,
                        failures,
                    }
                }
                Err(e) => {
                    failures += 1;
                    if attempts >= max_attempts {
                        let outcome = RetryOutcome {
                            value: None,
                            attempts,
                            failures,
                        };
                        let error_rate = outcome.error_rate_percent();
                        error!(
                            operation,
                            attempts,
                            error_rate_percent = error_rate,
                            last_error = %e,
                            "retry budget exhausted"
                        );
                        observability::record_retries_exhausted(operation, error_rate);
                        return outcome;
                    }
                    trace!(operation, attempt = attempts, error = %e, "attempt failed, retrying");
                }
            }
            tokio::time::sleep(self.delay).await;
        }
    }
}
