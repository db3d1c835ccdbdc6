//! Exponential backoff for calls to the remote classifier.
//!
//! Only the provider layer retries. Aggregation never retries on its own, so a
//! failure that survives this loop aborts the whole analysis.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const LOG_TARGET: &str = "util::retry";

/// Configuration for retry behavior
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts, the first call included
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Multiplier applied per further attempt
    pub backoff_multiplier: f64,
    /// Ceiling for any single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            ..Default::default()
        }
    }

    /// A single attempt, no retries.
    pub fn disabled() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(delay_ms.min(self.max_delay.as_millis() as f64) as u64)
    }
}

/// Run `f` until it succeeds, returns a non-retryable error, or attempts run out.
pub async fn retry_with_backoff<F, T, E, Fut>(
    config: &RetryConfig,
    mut f: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(target: LOG_TARGET, attempt, "call succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if attempt < config.max_attempts && is_retryable(&e) => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    target: LOG_TARGET,
                    attempt,
                    max_attempts = config.max_attempts,
                    ?delay,
                    "call failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Status codes worth another attempt: timeouts, throttling, server errors.
/// Hosted inference endpoints also answer 503 while a model is loading.
pub fn is_http_retryable(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}
