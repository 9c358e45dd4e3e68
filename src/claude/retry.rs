// Retry logic with exponential backoff

use anyhow::{anyhow, Result};
use std::time::Duration;
use tokio::time::sleep;

const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 1000;

/// How many attempts to make and how long to wait before the first retry
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Execute a function with exponential backoff retry logic
pub async fn with_retry<F, Fut, T>(policy: RetryPolicy, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                last_error = Some(e);

                if attempt < attempts - 1 {
                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        "Request failed (attempt {}/{}), retrying in {:?}",
                        attempt + 1,
                        attempts,
                        delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("Request was never attempted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry(RetryPolicy::default(), || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                anyhow::bail!("transient");
            }
            Ok(n)
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = with_retry(RetryPolicy::default(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("always down")
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES);
    }

    #[tokio::test]
    async fn test_policy_none_makes_one_attempt() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let _: Result<()> = with_retry(RetryPolicy::none(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("down")
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
