use std::future::Future;
use std::time::{Duration, Instant};

use metrics::histogram;
use tokio::time::sleep;
use tracing::warn;

use crate::error::Transient;
use crate::metrics_consts::DEPENDENCY_CALL_TIME;

pub const DEFAULT_BACKOFF: [Duration; 5] = [
    Duration::from_millis(500),
    Duration::from_secs(1),
    Duration::from_secs(3),
    Duration::from_secs(5),
    Duration::from_secs(10),
];

/// Runs `op` until it succeeds, fails terminally, or the schedule runs out.
///
/// A schedule of k delays allows at most k + 1 attempts, waiting the next
/// delay between attempts. The last attempt's error is returned without
/// another wait, and an empty schedule means exactly one attempt. Errors
/// tagged non-transient are returned immediately. Every attempt is timed
/// under the call name, whether it succeeds or not.
pub async fn retry_with_backoff<T, E, F, Fut>(
    call: &'static str,
    schedule: &[Duration],
    mut op: F,
) -> Result<T, E>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    for delay in schedule {
        match timed(call, op()).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                warn!(
                    call,
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "transient upstream failure, retrying"
                );
                sleep(*delay).await;
            }
            Err(err) => return Err(err),
        }
    }
    timed(call, op()).await
}

async fn timed<T>(call: &'static str, fut: impl Future<Output = T>) -> T {
    let start = Instant::now();
    let result = fut.await;
    histogram!(DEPENDENCY_CALL_TIME, &[("call", call)]).record(start.elapsed().as_secs_f64());
    result
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("upstream said no")]
    struct TestError {
        transient: bool,
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    const TINY: Duration = Duration::from_millis(1);

    async fn run_failing(
        schedule: &[Duration],
        transient: bool,
    ) -> (Result<(), TestError>, usize) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let result = retry_with_backoff("test_call", schedule, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TestError { transient })
            }
        })
        .await;
        (result, attempts.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn exhausts_the_schedule_then_surfaces_the_error() {
        let (result, attempts) = run_failing(&[TINY, TINY], true).await;
        assert!(result.is_err());
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn terminal_errors_short_circuit() {
        let (result, attempts) = run_failing(&[TINY, TINY, TINY], false).await;
        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn empty_schedule_means_one_attempt() {
        let (result, attempts) = run_failing(&[], true).await;
        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn stops_retrying_on_success() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let result = retry_with_backoff("test_call", &[TINY, TINY], move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TestError { transient: true })
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
