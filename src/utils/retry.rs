//! Bounded retries for transient failures of remote calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

const BASE_DELAY: Duration = Duration::from_millis(200);
const DELAY_CAP: Duration = Duration::from_secs(5);

/// Errors that may succeed when the same call is repeated.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// How many times a call is attempted and how long to wait between attempts.
///
/// Waits double after every failure, starting at `base_delay` and never
/// exceeding `delay_cap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    base_delay: Duration,
    delay_cap: Duration,
}

impl RetryPolicy {
    /// `retries` extra attempts after the first one.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            attempts: retries.saturating_add(1),
            base_delay: BASE_DELAY,
            delay_cap: DELAY_CAP,
        }
    }

    #[must_use]
    pub fn delays(mut self, base: Duration, cap: Duration) -> Self {
        self.base_delay = base;
        self.delay_cap = cap.max(base);
        self
    }

    /// Wait before attempt `attempt + 1`, where `attempt` counts from 1.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.delay_cap)
    }

    /// Run `call` until it succeeds, returns a permanent error, or the
    /// attempts are used up. The last error is returned as is.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut call: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.attempts && e.is_retryable() => {
                    let wait = self.backoff(attempt);
                    debug!(
                        "{} failed on attempt {}/{}: {}; retrying in {:?}",
                        what, attempt, self.attempts, e, wait
                    );
                    sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_retries(2)
    }
}
