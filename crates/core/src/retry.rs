//! Retry mechanism with bounded exponential backoff
//!
//! Every object transfer runs through [`retry_with_backoff`]. The delay before
//! attempt `n + 1` is `min(base * multiplier^(n-1), max)`; there is no jitter
//! so a run's wait schedule is reproducible.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Backoff policy for per-object transfer attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts per object, including the first
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_retries < 1 {
            return Err(Error::Configuration("max_retries must be at least 1".into()));
        }
        if self.base_delay_ms == 0 {
            return Err(Error::Configuration("base_delay must be positive".into()));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::Configuration(
                "max_delay must not be below base_delay".into(),
            ));
        }
        if !(self.backoff_multiplier > 1.0) {
            return Err(Error::Configuration(
                "backoff_multiplier must be greater than 1".into(),
            ));
        }
        Ok(())
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let raw = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Terminal result of a retried operation
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// `Ok` on success, the last error once attempts are exhausted
    pub result: Result<T>,

    /// Number of attempts made
    pub attempts: u32,
}

/// Retry a fallible async operation with exponential backoff
///
/// # Arguments
/// * `policy` - Retry policy
/// * `operation` - Async closure receiving the 1-based attempt number
/// * `is_retryable` - Closure that determines if an error should trigger retry
pub async fn retry_with_backoff<T, F, Fut, R>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: R,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    R: Fn(&Error) -> bool,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            Err(e) => {
                if attempt >= policy.max_retries || !is_retryable(&e) {
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt,
                    };
                }

                let backoff = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt,
                    max_attempts = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Retrying after failed attempt"
                );

                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Retry policy builder for easy customization
#[derive(Debug, Clone)]
pub struct RetryBuilder {
    policy: RetryPolicy,
}

impl RetryBuilder {
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
        }
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.policy.max_retries = n;
        self
    }

    pub fn base_delay_ms(mut self, ms: u64) -> Self {
        self.policy.base_delay_ms = ms;
        self
    }

    pub fn max_delay_ms(mut self, ms: u64) -> Self {
        self.policy.max_delay_ms = ms;
        self
    }

    pub fn backoff_multiplier(mut self, m: f64) -> Self {
        self.policy.backoff_multiplier = m;
        self
    }

    /// Build the policy, rejecting out-of-range values
    pub fn build(self) -> Result<RetryPolicy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_delay_cap() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay_ms: 1000,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        };
        assert_eq!(policy.delay_for(4), Duration::from_millis(5000));
        assert_eq!(policy.delay_for(200), Duration::from_millis(5000));
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(RetryBuilder::new().max_retries(0).build().is_err());
        assert!(RetryBuilder::new().base_delay_ms(0).build().is_err());
        assert!(
            RetryBuilder::new()
                .base_delay_ms(500)
                .max_delay_ms(100)
                .build()
                .is_err()
        );
        assert!(RetryBuilder::new().backoff_multiplier(1.0).build().is_err());
        assert!(RetryBuilder::new().backoff_multiplier(f64::NAN).build().is_err());
    }

    #[test]
    fn test_retry_builder() {
        let policy = RetryBuilder::new()
            .max_retries(5)
            .base_delay_ms(200)
            .max_delay_ms(20000)
            .backoff_multiplier(3.0)
            .build()
            .unwrap();

        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay_ms, 200);
        assert_eq!(policy.max_delay_ms, 20000);
        assert_eq!(policy.delay_for(2), Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let policy = RetryPolicy::default();
        let mut calls = 0;

        let outcome = retry_with_backoff(
            &policy,
            |_| {
                calls += 1;
                async { Ok::<_, Error>(42) }
            },
            |_| true,
        )
        .await;

        assert_eq!(outcome.result.unwrap(), 42);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_after_failure() {
        let policy = RetryPolicy::default();
        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();

        let outcome = retry_with_backoff(
            &policy,
            |_| {
                let cc = call_count_clone.clone();
                async move {
                    if cc.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::Transfer("timeout".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            },
            Error::is_retryable,
        )
        .await;

        assert_eq!(outcome.result.unwrap(), 42);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted_waits_between_attempts() {
        let policy = RetryPolicy::default();
        let started = tokio::time::Instant::now();
        let mut seen = Vec::new();

        let outcome: RetryOutcome<()> = retry_with_backoff(
            &policy,
            |attempt| {
                seen.push((attempt, started.elapsed()));
                async { Err(Error::Transfer("always fails".to_string())) }
            },
            |_| true,
        )
        .await;

        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(
            seen,
            vec![
                (1, Duration::ZERO),
                (2, Duration::from_millis(1000)),
                (3, Duration::from_millis(3000)),
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_non_retryable() {
        let policy = RetryPolicy::default();
        let mut calls = 0;

        let outcome: RetryOutcome<()> = retry_with_backoff(
            &policy,
            |_| {
                calls += 1;
                async { Err(Error::Configuration("bad".to_string())) }
            },
            Error::is_retryable,
        )
        .await;

        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls, 1);
    }
}
