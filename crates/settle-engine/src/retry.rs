//! Retry engine
//!
//! Retries a single mutation while its errors classify as transient. When
//! the budget expires the operation is attempted exactly once more, without
//! classification, and that result is returned. A call that only succeeds a
//! moment past the nominal deadline is therefore not reported as a failure.

use std::future::Future;

use settle_core::{Classifier, ErrorClass, RemoteError, Result, RetrySpec, SettleError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cancel::sleep_or_cancel;

/// Run `op`, retrying transient errors within `spec.timeout`
pub async fn retry<T, F, Fut, C>(
    mut op: F,
    spec: &RetrySpec<C>,
    cancel: &CancellationToken,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RemoteError>>,
    C: Classifier,
{
    let deadline = Instant::now() + spec.timeout;
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(SettleError::Cancelled);
        }

        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match spec.classifier.classify(&err) {
            ErrorClass::Transient => {}
            class => {
                tracing::debug!(attempt, ?class, error = %err, "not retrying");
                return Err(SettleError::Remote(err));
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        let delay = spec.backoff.bounded_delay(attempt, remaining);
        tracing::debug!(attempt, ?delay, error = %err, "retrying transient error");
        sleep_or_cancel(delay, cancel).await?;
        attempt += 1;

        if Instant::now() >= deadline {
            break;
        }
    }

    if cancel.is_cancelled() {
        return Err(SettleError::Cancelled);
    }

    // Post-timeout finalization: one unconditional attempt.
    tracing::debug!(attempts = attempt + 1, "retry budget exhausted, making final attempt");
    op().await.map_err(SettleError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use settle_core::{BackoffConfig, RuleClassifier};
    use std::future::ready;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn classifier() -> RuleClassifier {
        RuleClassifier::new(ErrorClass::Fatal)
            .code("InvalidDBClusterStateFault", ErrorClass::Transient)
            .code("DBClusterNotFoundFault", ErrorClass::NotFound)
    }

    fn spec(timeout: Duration) -> RetrySpec<RuleClassifier> {
        RetrySpec::new(timeout, classifier()).backoff(BackoffConfig::fixed(Duration::from_secs(1)))
    }

    fn state_fault() -> RemoteError {
        RemoteError::new("InvalidDBClusterStateFault", "DB cluster is not available")
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_until_success() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();

        let value = retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                ready(if n < 3 { Err(state_fault()) } else { Ok(n) })
            },
            &spec(Duration::from_secs(60)),
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_returns_immediately() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();

        let err = retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                ready(Err::<(), _>(RemoteError::new("AccessDenied", "no")))
            },
            &spec(Duration::from_secs(60)),
            &cancel,
        )
        .await
        .unwrap_err();

        assert_eq!(err.remote().map(|e| e.code.as_str()), Some("AccessDenied"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_returns_immediately() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();

        let err = retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                ready(Err::<(), _>(RemoteError::new("DBClusterNotFoundFault", "")))
            },
            &spec(Duration::from_secs(60)),
            &cancel,
        )
        .await
        .unwrap_err();

        assert_eq!(
            err.remote().map(|e| e.code.as_str()),
            Some("DBClusterNotFoundFault")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_attempt_after_budget_can_succeed() {
        let start = Instant::now();
        let budget = Duration::from_secs(5);
        let attempts = Mutex::new(Vec::new());
        let cancel = CancellationToken::new();

        let value = retry(
            || {
                let elapsed = start.elapsed();
                attempts.lock().unwrap().push(elapsed);
                ready(if elapsed < budget { Err(state_fault()) } else { Ok("done") })
            },
            &spec(budget),
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(value, "done");
        let attempts = attempts.lock().unwrap();
        // Attempts at 0..=4s inside the budget, then the final one at 5s.
        assert_eq!(attempts.len(), 6);
        assert_eq!(*attempts.last().unwrap(), budget);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_attempt_error_is_returned() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();

        let err = retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                ready(Err::<(), _>(state_fault()))
            },
            &spec(Duration::from_secs(3)),
            &cancel,
        )
        .await
        .unwrap_err();

        assert_eq!(
            err.remote().map(|e| e.code.as_str()),
            Some("InvalidDBClusterStateFault")
        );
        // 0s, 1s, 2s within budget, then the final attempt at 3s.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_still_makes_final_attempt() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();

        let value = retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                ready(if n == 0 { Err(state_fault()) } else { Ok(n) })
            },
            &spec(Duration::ZERO),
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(value, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_backoff() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            trigger.cancel();
        });

        let err = retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                ready(Err::<(), _>(state_fault()))
            },
            &spec(Duration::from_secs(600)),
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
