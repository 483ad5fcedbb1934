use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Bounded exponential backoff for errors the caller marks as retryable.
/// `max_retries == 0` runs the operation exactly once.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    pub fn with_max_retries(max_retries: u32) -> Self {
        Self::new(max_retries, INITIAL_BACKOFF, MAX_BACKOFF)
    }

    pub fn none() -> Self {
        Self::with_max_retries(0)
    }

    /// Runs `f` until it succeeds, returns a non-retryable error, or the
    /// retry budget is spent.
    pub async fn retry<F, Fut, T, E, R>(&self, operation: &str, retryable: R, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        R: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match f().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!(operation, attempts = attempt + 1, "Operation succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(e) if !retryable(&e) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        if self.max_retries > 0 {
                            warn!(operation, attempts = attempt, error = %e, "Operation failed after max retries");
                        }
                        return Err(e);
                    }

                    warn!(
                        operation,
                        attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying"
                    );
                    sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, self.max_backoff);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
