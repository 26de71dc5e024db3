//! Store-client retry policy
//!
//! Exponential backoff with jitter for transient store failures. The S3
//! adapter wraps every request in [`retry_with_backoff`]; the segregation
//! core never retries on its own and only sees the final result.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `config.max_attempts` is reached
pub async fn retry_with_backoff<T, F, Fut, R>(
    config: &RetryConfig,
    mut operation: F,
    is_retryable: R,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    R: Fn(&Error) -> bool,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= config.max_attempts || !is_retryable(&e) => return Err(e),
            Err(e) => {
                let backoff = backoff_for(config, attempt);
                tracing::debug!(
                    attempt,
                    max_attempts = config.max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Store request failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// initial * 2^(attempt-1), capped, plus up to the same again in jitter
fn backoff_for(config: &RetryConfig, attempt: u32) -> Duration {
    let base_ms = config
        .initial_backoff_ms
        .saturating_mul(1u64 << (attempt.saturating_sub(1)).min(10));
    let capped_ms = base_ms.min(config.max_backoff_ms);

    Duration::from_millis(capped_ms + jitter(capped_ms))
}

fn jitter(max: u64) -> u64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    nanos % max.max(1)
}

/// Whether a store error is transient
pub fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Network(msg) => {
            let msg = msg.to_lowercase();
            [
                "timeout",
                "timed out",
                "connection reset",
                "connection refused",
                "dispatch",
                "500",
                "503",
                "service unavailable",
                "internal error",
                "429",
                "too many requests",
                "slow down",
            ]
            .iter()
            .any(|needle| msg.contains(needle))
        }
        Error::Config(_)
        | Error::InvalidPath(_)
        | Error::Auth(_)
        | Error::NotFound(_)
        | Error::StoreUnavailable(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
        }
    }

    #[test]
    fn test_backoff_growth() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
        };

        let b1 = backoff_for(&config, 1);
        assert!(b1.as_millis() >= 100 && b1.as_millis() < 200);

        let b3 = backoff_for(&config, 3);
        assert!(b3.as_millis() >= 400 && b3.as_millis() < 800);
    }

    #[test]
    fn test_backoff_cap() {
        let config = RetryConfig {
            max_attempts: 20,
            initial_backoff_ms: 1000,
            max_backoff_ms: 5000,
        };
        assert!(backoff_for(&config, 15).as_millis() < 10_000);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable_error(&Error::Network(
            "Request timeout".to_string()
        )));
        assert!(is_retryable_error(&Error::Network(
            "Service error: SlowDown (code: 503)".to_string()
        )));
        assert!(!is_retryable_error(&Error::Auth(
            "InvalidAccessKeyId".to_string()
        )));
        assert!(!is_retryable_error(&Error::NotFound(
            "s3://data/missing".to_string()
        )));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_with_backoff(
            &fast_config(3),
            || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::Network("connection reset".to_string()))
                    } else {
                        Ok("listed")
                    }
                }
            },
            is_retryable_error,
        )
        .await;

        assert_eq!(result.unwrap(), "listed");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let mut calls = 0;

        let result: Result<()> = retry_with_backoff(
            &fast_config(2),
            || {
                calls += 1;
                async { Err(Error::Network("503 Service Unavailable".to_string())) }
            },
            is_retryable_error,
        )
        .await;

        assert!(matches!(result, Err(Error::Network(_))));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let mut calls = 0;

        let result: Result<()> = retry_with_backoff(
            &fast_config(5),
            || {
                calls += 1;
                async { Err(Error::NotFound("s3://data/x".to_string())) }
            },
            is_retryable_error,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
