use anyhow::Error;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

pub const RETRY_DELAY_MS: u64 = 500;

/// Runs `operation` until it succeeds or `retries` extra attempts are spent.
///
/// Only transport failures reach this loop; HTTP status handling happens on
/// the returned response, so error statuses are never retried here.
pub async fn with_retry<F, Fut, T>(
    label: &str,
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) if attempt < retries => {
                attempt += 1;
                warn!(
                    "{} attempt {}/{} failed: {}. Retrying...",
                    label,
                    attempt,
                    retries + 1,
                    err.without_url()
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(err) => return Err(Error::from(err.without_url())),
        }
    }
}
