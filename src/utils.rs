use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::debug;

/// Fibonacci backoff: each delay is the sum of the previous two.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub initial_delay: Duration,
    pub max_retries: usize,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_retries: 8,
        }
    }
}

/// Runs `operation` until it succeeds or `backoff.max_retries` retries have
/// failed, returning the last error.
pub async fn retry_with_backoff<T, E, Fut, F>(mut operation: F, backoff: Backoff) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut retries = 0;
    let mut fib = (backoff.initial_delay, backoff.initial_delay);

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if retries < backoff.max_retries => {
                retries += 1;
                debug!(
                    error = %e,
                    delay = ?fib.0,
                    attempt = retries,
                    max_retries = backoff.max_retries,
                    "Retrying"
                );
                sleep(fib.0).await;
                fib = (fib.1, fib.0 + fib.1);
            }
            Err(e) => return Err(e),
        }
    }
}
