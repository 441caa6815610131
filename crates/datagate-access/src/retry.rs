//! Retry policy for transient failures

use datagate_core::config::RetryConfig;
use datagate_core::AccessResult;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffStrategy {
    /// Same delay every time
    Fixed,
    /// delay * (attempt + 1)
    Linear,
    /// delay * 2^attempt
    Exponential,
}

impl BackoffStrategy {
    /// Delay before retry number `attempt` (zero-based)
    pub fn calculate_delay(
        &self,
        attempt: u32,
        initial_delay: Duration,
        max_delay: Duration,
    ) -> Duration {
        let delay = match self {
            BackoffStrategy::Fixed => initial_delay,
            BackoffStrategy::Linear => initial_delay.saturating_mul(attempt.saturating_add(1)),
            BackoffStrategy::Exponential => {
                initial_delay.saturating_mul(2u32.saturating_pow(attempt))
            }
        };

        delay.min(max_delay)
    }
}

/// Retry schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any delay
    pub max_delay: Duration,
    /// Growth of the delay
    pub strategy: BackoffStrategy,
}

impl RetryPolicy {
    /// Exponential backoff with the configured bounds
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Fixed delay between attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Delay before retry number `attempt` (zero-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        self.strategy
            .calculate_delay(attempt, self.initial_delay, self.max_delay)
    }

    /// Run `operation`, retrying while it fails with a retryable error
    ///
    /// Non-retryable errors and the error of the last attempt are returned
    /// as-is.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> AccessResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AccessResult<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !err.is_retryable() || attempt + 1 >= self.max_attempts {
                        return Err(err);
                    }

                    let delay = self.calculate_delay(attempt);
                    tracing::debug!(
                        "Retrying after {:?} (attempt {} of {}): {}",
                        delay,
                        attempt + 1,
                        self.max_attempts,
                        err
                    );
                    tokio::time::sleep(delay).await;

                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagate_core::AccessError;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn exponential_delay_is_capped() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 500,
            ..RetryConfig::default()
        });
        assert_eq!(policy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(400));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(500));
        assert_eq!(policy.calculate_delay(40), Duration::from_millis(500));
    }

    #[test]
    fn linear_delay_grows_by_step() {
        let delay = BackoffStrategy::Linear.calculate_delay(
            2,
            Duration::from_millis(10),
            Duration::from_secs(1),
        );
        assert_eq!(delay, Duration::from_millis(30));
    }

    #[tokio::test]
    async fn retries_only_retryable_errors() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(1));
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: AccessResult<()> = policy
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AccessError::conflict("stale"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        calls.store(0, Ordering::SeqCst);
        let result: AccessResult<()> = policy
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AccessError::retryable("stack unknown"))
            })
            .await;
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::fixed(5, Duration::from_millis(1));
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let value = policy
            .execute(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AccessError::retryable("not yet"))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    proptest! {
        #[test]
        fn delay_never_exceeds_cap(
            attempt in 0u32..64,
            initial_ms in 1u64..10_000,
            max_ms in 1u64..60_000,
        ) {
            let initial = Duration::from_millis(initial_ms);
            let max = Duration::from_millis(max_ms);
            for strategy in [BackoffStrategy::Fixed, BackoffStrategy::Linear, BackoffStrategy::Exponential] {
                let delay = strategy.calculate_delay(attempt, initial, max);
                prop_assert!(delay <= max);
                prop_assert!(delay >= initial.min(max));
            }
        }
    }
}
