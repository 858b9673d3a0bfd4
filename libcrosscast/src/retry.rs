//! Bounded retry policy for destination publish attempts
//!
//! Transient failures (rate limiting, timeouts) are retried with exponential
//! backoff; everything else fails immediately. The policy is a named value
//! injected into the dispatcher so it can be tuned and tested on its own.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::PublishError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff base; attempt n waits `base_delay * 2^(n-1)`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before the attempt following `attempt` (1-based). A retry-after
    /// hint from the destination takes precedence over the backoff curve.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        match retry_after {
            Some(secs) => Duration::from_secs(secs),
            None => self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1)),
        }
    }

    /// Run `f` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, PublishError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, PublishError>>,
    {
        let max_attempts = self.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{} succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt, e.retry_after);
                    warn!(
                        "transient error in {} (attempt {}/{}): {}. Retrying in {:?}",
                        operation, attempt, max_attempts, e, delay
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    if attempt == max_attempts && e.is_transient() {
                        warn!(
                            "{} failed after {} attempts: {}",
                            operation, max_attempts, e
                        );
                    }
                    return Err(e);
                }
            }
        }

        unreachable!("retry loop always returns from its final attempt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, PublishError>("done") }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_error_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Err(PublishError::timeout("slow"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, _> = fast_policy()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PublishError::auth("bad token")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, _> = fast_policy()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PublishError::rate_limit("throttled", None)) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_none_policy_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, _> = RetryPolicy::none()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PublishError::timeout("slow")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_backoff_curve() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
        };
        assert_eq!(policy.delay_for(1, None), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3, None), Duration::from_secs(4));
    }

    #[test]
    fn test_retry_after_hint_wins() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, Some(45)), Duration::from_secs(45));
    }
}
