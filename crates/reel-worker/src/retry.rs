//! Retry with exponential backoff for writes to the blob store.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// How often, and how patiently, an operation is retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further one.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Default::default()
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `operation` until it succeeds or the retries are used up.
    ///
    /// Returns the last error together with the number of attempts made.
    pub async fn run<F, Fut, T, E>(&self, name: &str, operation: F) -> Result<T, (E, u32)>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut retry = 0u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if retry < self.max_retries => {
                    retry += 1;
                    let delay = self.delay_for_retry(retry);
                    warn!(
                        operation = name,
                        attempt = retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err((e, retry + 1)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_retry(3), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Result<u32, (String, u32)> = policy
            .run("flaky", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("failure {}", n))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let result: Result<(), (&str, u32)> = policy
            .run("broken", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down")
            })
            .await;

        assert_eq!(result.unwrap_err(), ("down", 3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_none_makes_one_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), (&str, u32)> = RetryPolicy::none()
            .run("once", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down")
            })
            .await;
        assert_eq!(result.unwrap_err().1, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
