//! Retry logic with exponential backoff for upstream calls.
//!
//! Retries on transient failures (408, 429, 5xx, network errors). Other
//! statuses are final and handed back to the caller so the proxy can relay
//! them to the client as-is.

use anyhow::Result;
use rand::Rng;
use reqwest::{Response, StatusCode};
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for each subsequent delay.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

/// Determine if a status code is retryable.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS         // 429
        || status == StatusCode::INTERNAL_SERVER_ERROR // 500
        || status == StatusCode::BAD_GATEWAY           // 502
        || status == StatusCode::SERVICE_UNAVAILABLE   // 503
        || status == StatusCode::GATEWAY_TIMEOUT       // 504
        || status == StatusCode::REQUEST_TIMEOUT // 408
}

/// Execute an upstream request with retry logic.
///
/// Returns the first response that is successful or not worth retrying; when
/// attempts run out on a retryable status, that last response is returned.
/// Errors only when every attempt failed at the transport level.
pub async fn with_retry<F, Fut>(config: &RetryConfig, upstream: &str, operation: F) -> Result<Response>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = reqwest::Result<Response>>,
{
    let attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut last_error = None;

    for attempt in 1..=attempts {
        match operation().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    if attempt > 1 {
                        tracing::info!("{} succeeded on attempt {}", upstream, attempt);
                    }
                    return Ok(response);
                }
                if !is_retryable_status(status) || attempt == attempts {
                    return Ok(response);
                }
                tracing::warn!(
                    "{} returned {} on attempt {}/{}",
                    upstream,
                    status,
                    attempt,
                    attempts
                );
            }
            Err(e) => {
                // Network error (timeout, DNS failure, connection refused)
                tracing::warn!(
                    "{} network error on attempt {}/{}: {}",
                    upstream,
                    attempt,
                    attempts,
                    e
                );
                last_error = Some(e);
            }
        }

        if attempt < attempts {
            let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..500));
            let sleep_time = delay + jitter;
            tracing::info!(
                "{} retrying in {:.1}s (attempt {}/{})",
                upstream,
                sleep_time.as_secs_f64(),
                attempt + 1,
                attempts
            );
            tokio::time::sleep(sleep_time).await;

            delay = Duration::from_secs_f64(
                (delay.as_secs_f64() * config.backoff_factor).min(config.max_delay.as_secs_f64()),
            );
        }
    }

    match last_error {
        Some(e) => Err(anyhow::Error::new(e).context(format!(
            "{}: all {} attempts failed",
            upstream, attempts
        ))),
        None => anyhow::bail!("{}: no attempts made", upstream),
    }
}
