//! Bounded-parallelism task runner for network fan-out.
//! Audio, example-sentence and lemma fetches all go through here so that at
//! most `limit` requests are in flight per category at any time.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;

/// Runs `tasks` with at most `limit` concurrently in flight.
///
/// Results come back in input order regardless of completion order. A task
/// that fails (returns its own error value, or resolves late) still releases
/// its slot; this runner imposes no retry policy and no result inspection.
pub async fn run_limited<T, F, Fut>(tasks: Vec<F>, limit: usize) -> Vec<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let wrapped = tasks.into_iter().map(|task| {
        let semaphore = Arc::clone(&semaphore);
        async move {
            // Semaphore is never closed while we hold an Arc to it.
            let _permit = semaphore.acquire().await.expect("semaphore closed");
            task().await
        }
    });
    join_all(wrapped).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_limit() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                move || async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    i
                }
            })
            .collect();

        let results = run_limited(tasks, 6).await;
        assert!(peak.load(Ordering::SeqCst) <= 6);
        assert_eq!(results, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn results_keep_input_order_despite_varied_latency() {
        let tasks: Vec<_> = (0..8u64)
            .map(|i| {
                move || async move {
                    // Later tasks finish first.
                    tokio::time::sleep(Duration::from_millis(40 - i * 5)).await;
                    i
                }
            })
            .collect();
        let results = run_limited(tasks, 3).await;
        assert_eq!(results, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn failing_task_releases_its_slot() {
        let tasks: Vec<_> = (0..10)
            .map(|i| {
                move || async move {
                    if i % 2 == 0 {
                        Err::<usize, _>("boom")
                    } else {
                        Ok(i)
                    }
                }
            })
            .collect();
        // Limit 1: a stuck slot would deadlock the remaining nine tasks.
        let results =
            tokio::time::timeout(Duration::from_secs(1), run_limited(tasks, 1))
                .await
                .expect("pool deadlocked after task failure");
        assert_eq!(results.len(), 10);
        assert!(results[1].is_ok());
        assert!(results[2].is_err());
    }

    #[tokio::test]
    async fn zero_limit_is_clamped_to_one() {
        let tasks: Vec<_> = (0..3).map(|i| move || async move { i }).collect();
        let results = run_limited(tasks, 0).await;
        assert_eq!(results, vec![0, 1, 2]);
    }
}
