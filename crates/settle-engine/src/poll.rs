//! Poll engine
//!
//! Observes an entity through a caller-supplied refresh function until it
//! settles. Every decision is taken from the observation just made; the only
//! state carried between ticks is the consecutive target-hit and not-found
//! counters and the last status (for timeout diagnostics).
//!
//! ```text
//! delay ─► refresh ─┬─ error (fatal/transient) ──────────► Err(Remote)
//!                   ├─ absent ── tolerance exhausted? ──► Ok(None) | Err(NotFound)
//!                   ├─ failure status ─────────────────► Err(FailureState)
//!                   ├─ target status × N in a row ─────► Ok(Some(entity))
//!                   └─ pending / unrecognized ── sleep ─► refresh …
//!                                       deadline passed ─► Err(Timeout)
//! ```

use std::future::Future;

use settle_core::{
    Classifier, ErrorClass, Observation, RemoteError, Result, SettleError, Status, WaitSpec,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cancel::sleep_or_cancel;

/// Poll `refresh` until the entity reaches a status in `spec.target`
///
/// Returns the entity from the final target observation, or `None` when
/// absence was accepted as the terminal state. Refresh errors classified as
/// [`ErrorClass::NotFound`] count as an absent observation; any other refresh
/// error aborts the wait immediately. Retrying failed calls is the job of
/// [`crate::retry`], not of this loop.
pub async fn wait_for_status<T, S, F, Fut, C>(
    mut refresh: F,
    spec: &WaitSpec<S>,
    classifier: &C,
    cancel: &CancellationToken,
) -> Result<Option<T>>
where
    S: Status,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<Observation<T, S>, RemoteError>>,
    C: Classifier + ?Sized,
{
    spec.validate()?;

    let deadline = Instant::now() + spec.timeout;
    let interval = spec.timing.effective_interval();

    sleep_or_cancel(spec.timing.delay.min(spec.timeout), cancel).await?;

    let mut last_status: Option<String> = None;
    let mut target_hits: u32 = 0;
    let mut not_found: u32 = 0;
    let mut tick: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(SettleError::Cancelled);
        }

        if Instant::now() >= deadline {
            return Err(SettleError::Timeout {
                timeout: spec.timeout,
                last_status,
                expected: spec.expected(),
            });
        }

        tick += 1;
        let observation = match refresh().await {
            Ok(observation) => observation,
            Err(err) => match classifier.classify(&err) {
                ErrorClass::NotFound => Observation::Absent,
                _ => return Err(SettleError::Remote(err)),
            },
        };

        match observation {
            Observation::Absent => {
                target_hits = 0;
                not_found += 1;
                tracing::debug!(tick, not_found, "entity not found");

                if not_found > spec.not_found.tolerance {
                    if spec.not_found.accept_as_terminal {
                        return Ok(None);
                    }
                    return Err(SettleError::NotFound { checks: not_found });
                }
            }
            Observation::Present { entity, status } => {
                not_found = 0;
                last_status = Some(status.to_string());

                if spec.failure.contains(&status) {
                    return Err(SettleError::FailureState {
                        status: status.to_string(),
                        expected: spec.expected(),
                    });
                }

                if spec.target.contains(&status) {
                    target_hits += 1;
                    tracing::debug!(tick, %status, target_hits, "target status observed");

                    if target_hits >= spec.required_consecutive_target_hits {
                        return Ok(Some(entity));
                    }
                } else {
                    target_hits = 0;
                    if spec.pending.contains(&status) {
                        tracing::debug!(tick, %status, "still pending");
                    } else {
                        tracing::debug!(tick, %status, "unrecognized status, treating as pending");
                    }
                }
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        sleep_or_cancel(interval.min(remaining), cancel).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settle_core::classify::fatal;
    use settle_core::{Label, PollTiming};
    use std::future::{Ready, ready};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const INTERVAL: Duration = Duration::from_secs(10);

    /// Scripted refresh: replays observations, repeating the last one
    struct Script {
        steps: Vec<Option<&'static str>>,
        calls: AtomicUsize,
    }

    impl Script {
        fn new(steps: &[Option<&'static str>]) -> Self {
            Self {
                steps: steps.to_vec(),
                calls: AtomicUsize::new(0),
            }
        }

        fn statuses(steps: &[&'static str]) -> Self {
            Self::new(&steps.iter().map(|s| Some(*s)).collect::<Vec<_>>())
        }

        fn refresh(&self) -> Ready<std::result::Result<Observation<usize, Label>, RemoteError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.steps[call.min(self.steps.len() - 1)];
            ready(Ok(match step {
                Some(status) => Observation::present(call + 1, Label::new(status).unwrap()),
                None => Observation::Absent,
            }))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn label(s: &str) -> Label {
        Label::new(s).unwrap()
    }

    fn creating_spec() -> WaitSpec<Label> {
        WaitSpec::new([label("creating")], [label("available")])
            .failure([label("failed")])
            .timeout(INTERVAL * 5)
            .timing(PollTiming::every(INTERVAL))
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_three_ticks() {
        let script = Script::statuses(&["creating", "creating", "available"]);
        let cancel = CancellationToken::new();

        let entity = wait_for_status(|| script.refresh(), &creating_spec(), &fatal, &cancel)
            .await
            .unwrap();

        assert_eq!(entity, Some(3));
        assert_eq!(script.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_status_aborts() {
        let script = Script::statuses(&["creating", "failed"]);
        let cancel = CancellationToken::new();

        let err = wait_for_status(|| script.refresh(), &creating_spec(), &fatal, &cancel)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            SettleError::FailureState {
                status: "failed".to_string(),
                expected: "available".to_string(),
            }
        );
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_with_last_status() {
        let script = Script::statuses(&["creating"; 6]);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let err = wait_for_status(|| script.refresh(), &creating_spec(), &fatal, &cancel)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.last_status(), Some("creating"));
        assert_eq!(script.calls(), 5);

        let elapsed = start.elapsed();
        assert!(elapsed >= INTERVAL * 5);
        assert!(elapsed <= INTERVAL * 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_target_hits_reset_on_flap() {
        let script = Script::statuses(&[
            "creating",
            "available",
            "modifying",
            "available",
            "available",
        ]);
        let spec = creating_spec()
            .timeout(INTERVAL * 20)
            .consecutive_target_hits(2);
        let cancel = CancellationToken::new();

        let entity = wait_for_status(|| script.refresh(), &spec, &fatal, &cancel)
            .await
            .unwrap();

        assert_eq!(entity, Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecognized_status_keeps_polling() {
        let script = Script::statuses(&["creating", "storage-optimization", "available"]);
        let cancel = CancellationToken::new();

        let entity = wait_for_status(|| script.refresh(), &creating_spec(), &fatal, &cancel)
            .await
            .unwrap();

        assert_eq!(entity, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_delay_and_min_interval() {
        let script = Script::statuses(&["creating", "available"]);
        let spec = creating_spec().timeout(Duration::from_secs(600)).timing(PollTiming {
            delay: Duration::from_secs(30),
            interval: Duration::from_secs(1),
            min_interval: Duration::from_secs(10),
        });
        let cancel = CancellationToken::new();
        let start = Instant::now();

        wait_for_status(|| script.refresh(), &spec, &fatal, &cancel)
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_accepted_as_terminal() {
        let script = Script::new(&[Some("deleting"), Some("deleting"), None]);
        let spec = WaitSpec::new([label("deleting")], [])
            .accept_not_found()
            .not_found_tolerance(0)
            .timeout(INTERVAL * 10)
            .timing(PollTiming::every(INTERVAL));
        let cancel = CancellationToken::new();

        let entity = wait_for_status(|| script.refresh(), &spec, &fatal, &cancel)
            .await
            .unwrap();

        assert_eq!(entity, None);
        assert_eq!(script.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_tolerated_then_found() {
        let script = Script::new(&[None, None, Some("creating"), Some("available")]);
        let spec = creating_spec().not_found_tolerance(2);
        let cancel = CancellationToken::new();

        let entity = wait_for_status(|| script.refresh(), &spec, &fatal, &cancel)
            .await
            .unwrap();

        assert_eq!(entity, Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_budget_exhausted() {
        let script = Script::new(&[None]);
        let spec = creating_spec().timeout(INTERVAL * 100).not_found_tolerance(3);
        let cancel = CancellationToken::new();

        let err = wait_for_status(|| script.refresh(), &spec, &fatal, &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, SettleError::NotFound { checks: 4 });
        assert_eq!(script.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_error_aborts_without_retry() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();

        let err = wait_for_status(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                ready(Err::<Observation<(), Label>, _>(RemoteError::new(
                    "Throttling",
                    "Rate exceeded",
                )))
            },
            &creating_spec(),
            &fatal,
            &cancel,
        )
        .await
        .unwrap_err();

        assert_eq!(err.remote().map(|e| e.code.as_str()), Some("Throttling"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_error_counts_as_absent() {
        let cancel = CancellationToken::new();
        let spec = WaitSpec::new([label("deleting")], [])
            .accept_not_found()
            .not_found_tolerance(0)
            .timing(PollTiming::every(INTERVAL));
        let classifier = |err: &RemoteError| {
            if err.code_equals("DBClusterNotFoundFault") {
                ErrorClass::NotFound
            } else {
                ErrorClass::Fatal
            }
        };

        let entity = wait_for_status(
            || ready(Err::<Observation<(), Label>, _>(RemoteError::new("DBClusterNotFoundFault", ""))),
            &spec,
            &classifier,
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(entity, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_between_ticks() {
        let script = Script::statuses(&["creating"]);
        let spec = creating_spec().timeout(Duration::from_secs(3600));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(INTERVAL * 2 + Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = wait_for_status(|| script.refresh(), &spec, &fatal, &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(!err.is_timeout());
        assert_eq!(script.calls(), 3);
    }

    #[tokio::test]
    async fn test_invalid_spec_rejected_before_polling() {
        let script = Script::statuses(&["available"]);
        let spec = WaitSpec::new([label("creating")], []);
        let cancel = CancellationToken::new();

        let err = wait_for_status(|| script.refresh(), &spec, &fatal, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, SettleError::InvalidConfig(_)));
        assert_eq!(script.calls(), 0);
    }

    /// Expected outcome for a finite script under `creating_spec` with
    /// `hits` required target hits and a budget longer than the script.
    fn oracle(steps: &[&str], hits: u32) -> Option<std::result::Result<usize, &'static str>> {
        let mut run = 0;
        for (i, step) in steps.iter().enumerate() {
            match *step {
                "failed" => return Some(Err("failed")),
                "available" => {
                    run += 1;
                    if run >= hits {
                        return Some(Ok(i + 1));
                    }
                }
                _ => run = 0,
            }
        }
        None
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcome_matches_oracle_for_all_short_sequences() {
        const ALPHABET: [&str; 3] = ["creating", "available", "failed"];

        for len in 1..=4u32 {
            for code in 0..3usize.pow(len) {
                let mut steps = Vec::new();
                let mut n = code;
                for _ in 0..len {
                    steps.push(ALPHABET[n % 3]);
                    n /= 3;
                }
                // Pad with a non-terminal status so the script never settles on its own.
                steps.push("creating");

                for hits in 1..=2 {
                    let script = Script::statuses(&steps);
                    let spec = creating_spec()
                        .timeout(INTERVAL * 8)
                        .consecutive_target_hits(hits);
                    let cancel = CancellationToken::new();

                    let result = wait_for_status(|| script.refresh(), &spec, &fatal, &cancel).await;

                    match oracle(&steps, hits) {
                        Some(Ok(tick)) => assert_eq!(result, Ok(Some(tick)), "{:?}", steps),
                        Some(Err(status)) => {
                            assert_eq!(result.unwrap_err().last_status(), Some(status), "{:?}", steps)
                        }
                        None => assert!(result.unwrap_err().is_timeout(), "{:?}", steps),
                    }
                }
            }
        }
    }
}
