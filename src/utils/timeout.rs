use std::future::Future;
use std::time::Duration;

use anyhow::Result;

use crate::error::NetworkError;

/// Races an operation against a deadline.
///
/// If the deadline wins, the operation's future is dropped and a
/// distinguished [`NetworkError::Timeout`] carrying the label and the
/// deadline is returned. The dispatcher treats that error as transient and
/// non-punitive.
pub async fn with_timeout<T, F>(future: F, ms: u64, label: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(Duration::from_millis(ms), future).await {
        Ok(result) => result,
        Err(_) => Err(NetworkError::Timeout {
            label: label.to_string(),
            timeout_ms: ms,
        }
        .into()),
    }
}
