//! Chunked parallel processing.
//!
//! Items are dispatched in contiguous chunks of `concurrency`. All items in a
//! chunk run concurrently and every one of them settles before the next chunk
//! starts; a fixed pause separates chunks so the downstream API is not
//! saturated. A failing item never cancels its siblings or later chunks.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;

/// Default number of items in flight per chunk.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Pause between chunks.
pub const DELAY_BETWEEN_POSTS: Duration = Duration::from_millis(2000);

/// Batch configuration.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Chunk size. `0` behaves like `1`.
    pub concurrency: usize,
    /// Pause inserted between chunks, never after the last one.
    pub delay_between_batches: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            delay_between_batches: DELAY_BETWEEN_POSTS,
        }
    }
}

impl BatchOptions {
    pub fn new(concurrency: usize, delay_between_batches: Duration) -> Self {
        Self {
            concurrency,
            delay_between_batches,
        }
    }

    /// Set the chunk size.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the pause between chunks.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_between_batches = delay;
        self
    }
}

/// A failed item and its original position.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItemError<E> {
    pub index: usize,
    pub error: E,
}

/// Outcome of a batch run.
#[derive(Debug)]
pub struct BatchOutcome<T, E> {
    /// One slot per input item; `None` where the item failed.
    pub results: Vec<Option<T>>,
    /// One record per failed item, in completion order within each chunk.
    pub errors: Vec<BatchItemError<E>>,
}

impl<T, E> BatchOutcome<T, E> {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_some()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.errors.len()
    }
}

/// Run `processor(item, index)` over every item, `options.concurrency` at a
/// time.
///
/// Indices are captured at dispatch, so `results[i]` always belongs to
/// `items[i]` regardless of completion order.
pub async fn process_in_parallel<I, T, E, F, Fut>(items: Vec<I>, options: &BatchOptions, processor: F) -> BatchOutcome<T, E>
where
    F: Fn(I, usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let total = items.len();
    let concurrency = options.concurrency.max(1);

    let mut results: Vec<Option<T>> = Vec::with_capacity(total);
    results.resize_with(total, || None);
    let mut errors = Vec::new();

    let mut pending = items.into_iter().enumerate().peekable();
    let mut chunk_number = 0usize;

    while pending.peek().is_some() {
        if chunk_number > 0 && !options.delay_between_batches.is_zero() {
            tokio::time::sleep(options.delay_between_batches).await;
        }

        let chunk: Vec<(usize, I)> = pending.by_ref().take(concurrency).collect();
        tracing::debug!(
            chunk = chunk_number,
            size = chunk.len(),
            total,
            "Dispatching batch chunk"
        );

        let settled = join_all(chunk.into_iter().map(|(index, item)| {
            let fut = processor(item, index);
            async move { (index, fut.await) }
        }))
        .await;

        for (index, outcome) in settled {
            match outcome {
                Ok(value) => results[index] = Some(value),
                Err(error) => errors.push(BatchItemError { index, error }),
            }
        }

        chunk_number += 1;
    }

    BatchOutcome { results, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn no_delay(concurrency: usize) -> BatchOptions {
        BatchOptions::new(concurrency, Duration::ZERO)
    }

    #[test]
    fn test_batch_options_default() {
        let options = BatchOptions::default();
        assert_eq!(options.concurrency, 3);
        assert_eq!(options.delay_between_batches, Duration::from_millis(2000));
    }

    #[test]
    fn test_batch_options_builder() {
        let options = BatchOptions::default()
            .with_concurrency(8)
            .with_delay(Duration::from_millis(50));
        assert_eq!(options.concurrency, 8);
        assert_eq!(options.delay_between_batches, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_results_are_positional_for_any_concurrency() {
        let items: Vec<u64> = (0..10).collect();

        for concurrency in [1, 2, 3, 4, 10, 25] {
            let outcome = process_in_parallel(items.clone(), &no_delay(concurrency), |item, index| async move {
                // Later items finish first within a chunk
                tokio::time::sleep(Duration::from_millis(10 - item)).await;
                Ok::<_, String>(item * 100 + index as u64)
            })
            .await;

            assert!(outcome.errors.is_empty());
            for (i, r) in outcome.results.iter().enumerate() {
                assert_eq!(*r, Some(i as u64 * 101));
            }
        }
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let items: Vec<i32> = (0..7).collect();

        let outcome = process_in_parallel(items, &no_delay(3), |item, _| async move {
            if item % 3 == 0 { Err(format!("bad {}", item)) } else { Ok(item * 2) }
        })
        .await;

        let mut failed: Vec<usize> = outcome.errors.iter().map(|e| e.index).collect();
        failed.sort_unstable();
        assert_eq!(failed, vec![0, 3, 6]);

        for e in &outcome.errors {
            assert!(outcome.results[e.index].is_none());
            assert_eq!(e.error, format!("bad {}", e.index));
        }
        assert_eq!(outcome.results[1], Some(2));
        assert_eq!(outcome.results[5], Some(10));
        assert_eq!(outcome.success_count(), 4);
        assert_eq!(outcome.failure_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let outcome = process_in_parallel(Vec::<u8>::new(), &BatchOptions::default(), |item, _| async move {
            Ok::<_, ()>(item)
        })
        .await;
        assert!(outcome.results.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded_per_chunk() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let outcome = process_in_parallel((0..9u32).collect::<Vec<_>>(), &no_delay(3), |item, _| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ()>(item)
            }
        })
        .await;

        assert_eq!(outcome.success_count(), 9);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_between_chunks() {
        let start = Instant::now();

        // 7 items at concurrency 3 => 3 chunks => 2 pauses
        let outcome = process_in_parallel((0..7).collect::<Vec<u8>>(), &BatchOptions::default(), |item, _| async move {
            Ok::<_, ()>(item)
        })
        .await;

        assert_eq!(outcome.success_count(), 7);
        assert_eq!(start.elapsed(), DELAY_BETWEEN_POSTS * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_chunk_waits_for_slowest_item() {
        let start = Instant::now();
        let started_at = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let recorder = started_at.clone();
        process_in_parallel(vec![300u64, 10, 10, 10], &no_delay(3), move |ms, index| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().push((index, start.elapsed()));
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<_, ()>(())
            }
        })
        .await;

        let started = started_at.lock();
        let fourth = started.iter().find(|(i, _)| *i == 3).unwrap();
        assert_eq!(fourth.1, Duration::from_millis(300));
    }
}
