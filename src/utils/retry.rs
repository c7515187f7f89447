use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

/// Fixed-delay retry policy for a zero-argument async operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryOptions {
    /// Additional attempts after the first one.
    pub times: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            times: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

impl RetryOptions {
    pub fn new(times: u32, delay_ms: u64) -> Self {
        Self {
            times,
            delay: Duration::from_millis(delay_ms),
        }
    }
}

/// Retries `operation` with a fixed delay until it succeeds or attempts run
/// out; the last error is propagated with context.
pub async fn with_retry<T, F, Fut>(
    options: RetryOptions,
    operation_name: &str,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_retry_notify(options, operation_name, operation, |_, _| {}).await
}

/// Like [`with_retry`], invoking `on_retry(error, remaining)` before each
/// wait. `remaining` counts the attempts still available including the one
/// about to run, matching the countdown the caller configured.
pub async fn with_retry_notify<T, F, Fut, C>(
    options: RetryOptions,
    operation_name: &str,
    mut operation: F,
    mut on_retry: C,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    C: FnMut(&anyhow::Error, u32),
{
    let mut remaining = options.times;
    let mut attempt: u32 = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                if remaining == 0 {
                    let error_msg = format!("{}", e);
                    return Err(e).context(format!(
                        "{} failed after {} attempts. Last error: {}",
                        operation_name, attempt, error_msg
                    ));
                }

                debug!(
                    "{} failed (attempt {}). Retrying in {:?}: {}",
                    operation_name, attempt, options.delay, e
                );
                on_retry(&e, remaining);
                tokio::time::sleep(options.delay).await;
                remaining -= 1;
                attempt += 1;
            }
        }
    }
}
