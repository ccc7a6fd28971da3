//! Rate limiting and retry logic
//!
//! Provides exponential backoff with jitter for handling API rate limits and
//! transient errors (429, 500, 502, 503, 504). A server-provided
//! `Retry-After` takes precedence over the computed delay.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

/// Whether an HTTP status code warrants a retry.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Delay before the given retry attempt (1-based), with up to 25% jitter.
    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let base = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1) as u32))
            .min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0.0..=0.25);
        base.mul_f64(1.0 + jitter).min(self.max_delay)
    }
}

/// Run `op` with bounded exponential backoff on transient provider errors.
///
/// Permanent errors are returned immediately. The backoff sleep is a
/// suspension point: cancellation is observed there and surfaces as a
/// permanent error so the caller's loop can exit.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut last_error = String::new();

    for attempt in 1..=config.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                last_error = err.to_string();
                if attempt == config.max_attempts {
                    break;
                }

                let delay = err
                    .retry_after()
                    .unwrap_or_else(|| config.delay_for_attempt(attempt))
                    .min(config.max_delay);
                tracing::warn!(attempt, ?delay, error = %last_error, "retrying model call");

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        return Err(ProviderError::Permanent {
                            status: None,
                            message: "cancelled during retry backoff".to_string(),
                        });
                    }
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(ProviderError::RetriesExhausted {
        attempts: config.max_attempts,
        last: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn retryable_status_table() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status), "{status} should retry");
        }
        for status in [400, 401, 403, 404, 422] {
            assert!(!is_retryable_status(status), "{status} should not retry");
        }
    }

    #[test]
    fn delay_grows_and_caps() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert!(config.delay_for_attempt(1) >= Duration::from_millis(100));
        assert!(config.delay_for_attempt(4) <= Duration::from_millis(350));
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let attempts = AtomicUsize::new(0);
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };

        let result: Result<(), _> = with_retry(&config, &CancellationToken::new(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ProviderError::Transient {
                    status: Some(503),
                    message: "unavailable".to_string(),
                    retry_after: None,
                })
            }
        })
        .await;

        assert!(matches!(
            result,
            Err(ProviderError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_returns_immediately() {
        let attempts = AtomicUsize::new(0);
        let config = RetryConfig::default();

        let result: Result<(), _> = with_retry(&config, &CancellationToken::new(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ProviderError::Permanent {
                    status: Some(401),
                    message: "bad key".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Permanent { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = AtomicUsize::new(0);
        let config = RetryConfig {
            max_attempts: 4,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };

        let result = with_retry(&config, &CancellationToken::new(), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::Transient {
                        status: Some(429),
                        message: "rate limited".to_string(),
                        retry_after: None,
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
