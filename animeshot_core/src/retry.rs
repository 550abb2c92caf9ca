//! Bounded retries with exponential backoff

use crate::error::{Error, Result};
use log::warn;
use std::future::Future;
use std::time::Duration;

/// Retry policy shared by the storage, persistence and recognition calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for the computed delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Calculate the delay before retry number `retry` (zero based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently or the attempts are
    /// used up. Returns the last result together with the number of attempts made.
    ///
    /// A server supplied retry-after hint wins over a shorter computed delay, but
    /// never exceeds `max_delay`.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut operation: F) -> (Result<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return (Ok(value), attempt),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let computed = self.delay_for(attempt - 1);
                    let delay = retry_hint(&err)
                        .map_or(computed, |hint| hint.max(computed).min(self.max_delay));
                    warn!(
                        "{label} failed (attempt {attempt}/{}): {err}; retrying in {delay:?}",
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return (Err(err), attempt),
            }
        }
    }
}

fn retry_hint(err: &Error) -> Option<Duration> {
    match err {
        Error::Recognition(e) => e.retry_after(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RecognitionError, StorageError, ValidationError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5))
    }

    #[test]
    fn test_delay_for_exponential_backoff() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
        assert_eq!(policy.delay_for(3), Duration::from_secs(16));

        // Max delay cap
        assert_eq!(policy.delay_for(10), Duration::from_secs(60));
        assert_eq!(policy.delay_for(40), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let (result, attempts) = fast(3)
            .execute("download", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StorageError::network("download", "reset").into())
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (result, attempts): (Result<()>, u32) = fast(4)
            .execute("recognize", || async {
                Err(RecognitionError::rate_limited(None).into())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_is_capped_by_max_delay() {
        let policy = RetryPolicy::new(2, Duration::from_secs(1), Duration::from_secs(30));
        let started = tokio::time::Instant::now();

        let (result, attempts): (Result<()>, u32) = policy
            .execute("recognize", || async {
                Err(RecognitionError::rate_limited(Some(Duration::from_secs(3 * 3600))).into())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 2);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(30) && waited < Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_extends_short_backoff() {
        let policy = RetryPolicy::new(2, Duration::from_secs(1), Duration::from_secs(30));
        let started = tokio::time::Instant::now();

        let _: (Result<()>, u32) = policy
            .execute("recognize", || async {
                Err(RecognitionError::rate_limited(Some(Duration::from_secs(7))).into())
            })
            .await;

        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(7) && waited < Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let (result, attempts): (Result<()>, u32) = fast(5)
            .execute("persist", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ValidationError::invalid_configuration("nope").into())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
