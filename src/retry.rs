//! Retry with deterministic exponential backoff
//!
//! Every call against the search collection goes through [`execute`]. The
//! delay before retry `n` (zero-based) is `initial_delay * backoff_factor^n`,
//! with no jitter. Only errors whose [`is_retryable`](crate::error::Error::is_retryable) is true consume
//! retry budget; everything else is returned on the first failure. The error
//! returned after the last attempt is the operation's own error, unchanged.

use crate::error::Result;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Retry budget for one kind of operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of calls, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay after each retry
    pub backoff_factor: f64,

    /// Upper bound for a single delay (milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_delay_ms() -> u64 {
    300_000
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay_ms: u64, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            backoff_factor,
            max_delay_ms: default_max_delay_ms(),
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(format!(
                "backoff_factor must be >= 1.0 (got {})",
                self.backoff_factor
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err("max_delay_ms must be >= initial_delay_ms".to_string());
        }
        Ok(())
    }

    /// Deterministic schedule: no randomization, no elapsed-time cutoff
    fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay())
            .with_multiplier(self.backoff_factor)
            .with_randomization_factor(0.0)
            .with_max_interval(Duration::from_millis(self.max_delay_ms))
            .with_max_elapsed_time(None)
            .build()
    }

    /// The sleeps between attempts, in order
    #[cfg(test)]
    fn delays(&self) -> Vec<Duration> {
        let mut schedule = self.schedule();
        (1..self.max_attempts)
            .map_while(|_| schedule.next_backoff())
            .collect()
    }
}

/// Run `op` under `policy`, retrying transient failures.
pub async fn execute<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut schedule = policy.schedule();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        debug!(operation, attempt, "Calling backend");

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => {
                debug!(operation, attempt, error = %e, kind = %e.kind(), "Not retrying");
                return Err(e);
            }
            Err(e) => {
                if attempt >= policy.max_attempts {
                    error!(operation, attempts = attempt, error = %e, "Max retries exceeded");
                    return Err(e);
                }

                match schedule.next_backoff() {
                    Some(delay) => {
                        warn!(
                            operation,
                            attempt,
                            retry_in_ms = delay.as_millis() as u64,
                            error = %e,
                            "Backend call failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(operation, error = %e, "Backoff exhausted");
                        return Err(e);
                    }
                }
            }
        }
    }
}

/// Like [`execute`], but any final failure is logged and replaced by `fallback`
pub async fn execute_or<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    fallback: T,
    op: F,
) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match execute(policy, operation, op).await {
        Ok(value) => value,
        Err(e) => {
            warn!(operation, error = %e, "Giving up, using fallback");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind, ValidationError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::new(4, 1_000, 2.0);
        assert_eq!(
            policy.delays(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );

        let single = RetryPolicy::new(1, 1_000, 2.0);
        assert!(single.delays().is_empty());
    }

    #[test]
    fn test_delay_capped() {
        let mut policy = RetryPolicy::new(5, 1_000, 10.0);
        policy.max_delay_ms = 5_000;
        assert_eq!(policy.delays()[2], Duration::from_secs(5));
    }

    #[test]
    fn test_policy_validation() {
        assert!(RetryPolicy::new(3, 1_000, 2.0).validate().is_ok());
        assert!(RetryPolicy::new(0, 1_000, 2.0).validate().is_err());
        assert!(RetryPolicy::new(3, 1_000, 0.5).validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_op_called_max_attempts_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, 1_000, 2.0);
        let start = Instant::now();

        let result: Result<()> = execute(&policy, "probe", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::BackendUnavailable("collection not ready".to_string()))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let slept = start.elapsed();
        assert!(slept >= Duration::from_secs(3) && slept < Duration::from_millis(3_010));
        match result {
            Err(Error::BackendUnavailable(msg)) => assert_eq!(msg, "collection not ready"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, 1_000, 2.0);

        let result = execute(&policy, "create", || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(Error::BackendUnavailable("503".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_failure_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, 1_000, 2.0);
        let start = Instant::now();

        let result: Result<()> = execute(&policy, "create", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Validation(ValidationError::MissingField(
                    "text".to_string(),
                )))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authorization_failure_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(5, 1_000, 2.0);

        let result: Result<()> = execute(&policy, "create", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Authorization("403".to_string()))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Authorization);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_or_falls_back() {
        let policy = RetryPolicy::new(2, 2_000, 2.0);
        let start = Instant::now();

        let exists = execute_or(&policy, "exists", false, || async {
            Err(Error::BackendUnavailable("timeout".to_string()))
        })
        .await;

        assert!(!exists);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
