//! Retry logic for outbound queries.
//!
//! # Design Decisions
//! - Only errors that report `is_retryable()` are retried
//! - Attempts are bounded by `max_attempts`, first attempt included
//! - Jittered backoff between attempts

use std::future::Future;

use crate::config::RetryConfig;
use crate::error::FetchError;
use crate::resilience::backoff::calculate_backoff;

/// Run `op` until it succeeds, fails permanently, or attempts run out.
pub async fn retry_fetch<T, F, Fut>(config: &RetryConfig, what: &str, mut op: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = if config.enabled { config.max_attempts.max(1) } else { 1 };
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = calculate_backoff(attempt, config);
                tracing::warn!(
                    target_name = what,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
