// Retry with a fixed backoff schedule and multiplicative jitter.
//
// Delays come from a per-attempt schedule rather than a computed exponent so the
// schedule can be tuned (or shortened in tests) without touching the loop.

use std::future::Future;
use std::time::Duration;

use rand::RngExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::ResolveError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay after the failed attempt with the same index. The last entry is
    /// reused when there are more attempts than entries.
    pub delays: Vec<Duration>,
    /// Relative jitter: each delay is multiplied by a uniform factor in
    /// `[1 - jitter, 1 + jitter]`. Zero disables jitter.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            delays: [1, 2, 4, 8, 16, 32]
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Unjittered delay after the failed attempt `attempt` (0-indexed).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let index = (attempt as usize).min(self.delays.len().saturating_sub(1));
        self.delays.get(index).copied().unwrap_or_default()
    }

    /// Compute the jittered delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || base.is_zero() {
            return base;
        }

        let factor = rand::rng().random_range((1.0 - jitter)..=(1.0 + jitter));
        base.mul_f64(factor)
    }

    /// Sum of the delays actually slept when every attempt fails: there is no
    /// sleep after the final attempt.
    pub fn total_base_delay(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.base_delay(attempt))
            .sum()
    }
}

/// Result of a single attempt, used by the caller to signal retryability.
pub enum RetryAction<T> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed with a retryable error.
    Retry(ResolveError),
    /// Operation failed with an error that must not be retried.
    Fail(ResolveError),
}

/// A successful value together with the number of attempts it took.
#[derive(Debug)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Execute an async operation with retry-and-backoff.
///
/// The `operation` closure receives the current attempt number (0-indexed).
/// Cancellation is observed before each attempt, while an attempt is in flight
/// and during backoff sleeps. When every attempt fails the result is
/// [`ResolveError::ExhaustedRetries`] carrying the last attempt error.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    operation: F,
) -> Result<Attempted<T>, ResolveError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = RetryAction<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..max_attempts {
        if token.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        let action = tokio::select! {
            _ = token.cancelled() => return Err(ResolveError::Cancelled),
            action = operation(attempt) => action,
        };

        match action {
            RetryAction::Success(value) => {
                return Ok(Attempted {
                    value,
                    attempts: attempt + 1,
                });
            }
            RetryAction::Fail(err) => return Err(err),
            RetryAction::Retry(err) => {
                if attempt + 1 >= max_attempts {
                    warn!(
                        attempt = attempt + 1,
                        max = max_attempts,
                        error = %err,
                        "Final attempt failed"
                    );
                    last_error = Some(err);
                    break;
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    max = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after failed attempt"
                );
                last_error = Some(err);
                tokio::select! {
                    _ = token.cancelled() => {
                        return Err(ResolveError::Cancelled);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    Err(ResolveError::exhausted(max_attempts, last_error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delays: vec![Duration::from_millis(1)],
            jitter: 0.0,
        }
    }

    #[test]
    fn delay_without_jitter_is_deterministic() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(32));
        // past the end of the schedule the last delay is reused
        assert_eq!(policy.delay_for_attempt(9), Duration::from_secs(32));
    }

    #[test]
    fn delay_with_jitter_stays_within_twenty_percent() {
        let policy = RetryPolicy::default();
        for attempt in 0..6 {
            let base = policy.base_delay(attempt);
            for _ in 0..32 {
                let delay = policy.delay_for_attempt(attempt);
                assert!(delay >= base.mul_f64(0.8), "{delay:?} below bound");
                assert!(delay <= base.mul_f64(1.2), "{delay:?} above bound");
            }
        }
    }

    #[test]
    fn total_base_delay_skips_sleep_after_last_attempt() {
        assert_eq!(
            RetryPolicy::default().total_base_delay(),
            Duration::from_secs(1 + 2 + 4 + 8 + 16)
        );
        assert_eq!(fast_policy(1).total_base_delay(), Duration::ZERO);
    }

    #[tokio::test]
    async fn retry_succeeds_on_first_attempt() {
        let token = CancellationToken::new();
        let result =
            retry_with_backoff(&fast_policy(3), &token, |_| async { RetryAction::Success(42u32) })
                .await
                .unwrap();
        assert_eq!(result.value, 42);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn retry_fails_immediately_on_non_retryable() {
        let token = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let result: Result<Attempted<u32>, _> = retry_with_backoff(&fast_policy(3), &token, |_| {
            attempts.fetch_add(1, Ordering::Relaxed);
            async { RetryAction::Fail(ResolveError::invalid_url("", "empty")) }
        })
        .await;
        assert!(matches!(result, Err(ResolveError::InvalidUrl { .. })));
        assert_eq!(attempts.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn retry_exhausts_then_reports_last_error() {
        let token = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let result: Result<Attempted<u32>, _> = retry_with_backoff(&fast_policy(3), &token, |n| {
            attempts.fetch_add(1, Ordering::Relaxed);
            async move { RetryAction::Retry(ResolveError::backend(format!("attempt {n}"))) }
        })
        .await;

        assert_eq!(attempts.load(Ordering::Relaxed), 3);
        match result {
            Err(ResolveError::ExhaustedRetries { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(
                    last.map(|e| e.to_string()).as_deref(),
                    Some("extraction backend error: attempt 2")
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_succeeds_on_second_attempt() {
        let token = CancellationToken::new();
        let result = retry_with_backoff(&fast_policy(3), &token, |attempt| async move {
            if attempt == 0 {
                RetryAction::Retry(ResolveError::backend("timeout"))
            } else {
                RetryAction::Success(99u32)
            }
        })
        .await
        .unwrap();
        assert_eq!(result.value, 99);
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_sleeps_follow_the_schedule() {
        let policy = RetryPolicy::default();
        let token = CancellationToken::new();
        let started = Instant::now();

        let result: Result<Attempted<()>, _> = retry_with_backoff(&policy, &token, |_| async {
            RetryAction::Retry(ResolveError::backend("down"))
        })
        .await;
        assert!(result.is_err());

        let elapsed = started.elapsed();
        let total = policy.total_base_delay();
        assert!(elapsed >= total.mul_f64(0.8), "elapsed {elapsed:?}");
        assert!(elapsed <= total.mul_f64(1.2), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn retry_respects_cancellation() {
        let policy = RetryPolicy {
            max_attempts: 10,
            delays: vec![Duration::from_secs(100)],
            jitter: 0.0,
        };
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<Attempted<u32>, _> =
            retry_with_backoff(&policy, &token, |_| async { RetryAction::Success(1u32) }).await;
        assert!(matches!(result, Err(ResolveError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff_sleep() {
        let policy = RetryPolicy {
            max_attempts: 3,
            delays: vec![Duration::from_secs(100)],
            jitter: 0.0,
        };
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result: Result<Attempted<u32>, _> = retry_with_backoff(&policy, &token, |_| async {
            RetryAction::Retry(ResolveError::backend("down"))
        })
        .await;
        assert!(matches!(result, Err(ResolveError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(100));
    }
}
