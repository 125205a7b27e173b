//! Exponential backoff for idempotent Kore reads.
//!
//! Provisioning submissions are never retried here: a POST that timed out
//! may still have created a request at the provider.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{KoreError, KoreResult};

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = no retries).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms: default_max_delay_ms(),
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &KoreError) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }

    /// `min(base * 2^attempt, max)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(exponential.min(self.max_delay_ms))
    }

    /// Run `f` until it succeeds, fails permanently, or retries run out.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut f: F) -> KoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = KoreResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(error) if self.should_retry(attempt, &error) => {
                    let delay = self.delay_for(attempt);
                    debug!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "Retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    if attempt > 0 && error.is_retryable() {
                        warn!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            error = %error,
                            "Max retries exceeded"
                        );
                        return Err(KoreError::MaxRetriesExceeded {
                            attempts: attempt + 1,
                            message: format!("{operation_name}: {error}"),
                        });
                    }
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(8), Duration::from_millis(1_000));
    }

    #[test]
    fn test_should_retry_respects_kind_and_budget() {
        let policy = RetryPolicy::new(2, 0);
        let transient = KoreError::Network("reset".into());
        let permanent = KoreError::Http {
            status: 404,
            body: String::new(),
        };
        assert!(policy.should_retry(0, &transient));
        assert!(!policy.should_retry(2, &transient));
        assert!(!policy.should_retry(0, &permanent));
    }

    #[tokio::test]
    async fn test_execute_recovers_from_transient_error() {
        let policy = RetryPolicy::new(3, 0);
        let calls = Arc::new(AtomicU32::new(0));

        let c = calls.clone();
        let result = policy
            .execute("status", || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(KoreError::Timeout("slow".into()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_execute_gives_up_after_budget() {
        let policy = RetryPolicy::new(2, 0);
        let calls = Arc::new(AtomicU32::new(0));

        let c = calls.clone();
        let result: KoreResult<()> = policy
            .execute("status", || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(KoreError::Http {
                        status: 502,
                        body: "bad gateway".into(),
                    })
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(KoreError::MaxRetriesExceeded { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_does_not_retry_permanent_error() {
        let policy = RetryPolicy::new(5, 0);
        let calls = Arc::new(AtomicU32::new(0));

        let c = calls.clone();
        let result: KoreResult<()> = policy
            .execute("status", || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(KoreError::Auth("denied".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(KoreError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
