//! Bounded retry with fixed delay, shared by every polling gate.

use engine::RetryPolicy;
use std::future::Future;
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

/// The retry budget ran out without the predicate ever succeeding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} did not succeed after {attempts} attempts")]
pub struct RetryExhausted {
    pub operation: String,
    pub attempts: u32,
}

/// Run `attempt` up to `policy.max_attempts` times with `policy.delay()`
/// between attempts. The first success short-circuits and returns the
/// attempt number; no delay is slept after the final attempt.
pub async fn retry_until<F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> Result<u32, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for n in 1..=policy.max_attempts {
        if attempt().await {
            debug!(operation, attempt = n, "succeeded");
            return Ok(n);
        }

        if n < policy.max_attempts {
            debug!(
                operation,
                attempt = n,
                max_attempts = policy.max_attempts,
                "not ready, waiting {:?}",
                policy.delay()
            );
            sleep(policy.delay()).await;
        }
    }

    Err(RetryExhausted {
        operation: operation.to_string(),
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_exhaustion_makes_exactly_n_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(4, 0);

        let err = retry_until(&policy, "never succeeds", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { false }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.attempts, 4);
        assert!(err.to_string().contains("never succeeds"));
    }

    #[tokio::test]
    async fn test_immediate_success_makes_one_attempt() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(10, 60);

        let attempt = retry_until(&policy, "instant", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { true }
        })
        .await
        .unwrap();

        assert_eq!(attempt, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_on_third_attempt_short_circuits() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(10, 0);

        let attempt = retry_until(&policy, "third time", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { n == 3 }
        })
        .await
        .unwrap();

        assert_eq!(attempt, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
