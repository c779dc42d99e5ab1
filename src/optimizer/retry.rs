//! Retry with exponential backoff.
//!
//! Wraps any fallible async operation. The delay before retry `n` (1-indexed)
//! is `base_delay * multiplier^(n-1)`, so the first retry waits exactly
//! `base_delay`. The last error is returned unchanged once attempts run out.

use std::future::Future;
use std::time::Duration;

/// Default number of attempts (including the first one).
pub const MAX_RETRIES: u32 = 3;

/// Default delay before the first retry.
pub const BASE_DELAY: Duration = Duration::from_millis(1000);

/// Default growth factor between consecutive delays.
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Total attempts, including the first. `0` behaves like `1`.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Growth factor applied per attempt.
    pub multiplier: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: BASE_DELAY,
            multiplier: BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryOptions {
    /// Create options with custom values.
    pub fn new(max_retries: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_retries,
            base_delay,
            multiplier,
        }
    }

    /// Delay to sleep after failed attempt `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.powi(exponent);
        if !factor.is_finite() || factor < 0.0 {
            return self.base_delay;
        }
        self.base_delay.mul_f64(factor)
    }
}

/// Run `operation` with retries and no retry hook.
pub async fn with_retry<T, E, F, Fut>(options: &RetryOptions, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    with_retry_notify(options, |_, _| {}, operation).await
}

/// Run `operation` with retries, calling `on_retry(attempt, &error)` before
/// each backoff sleep.
///
/// `on_retry` is never called for the final attempt, so it runs exactly
/// `attempts_taken - 1` times.
pub async fn with_retry_notify<T, E, F, Fut, N>(
    options: &RetryOptions,
    mut on_retry: N,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    N: FnMut(u32, &E),
{
    let max_attempts = options.max_retries.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => return Err(err),
            Err(err) => {
                on_retry(attempt, &err);
                tokio::time::sleep(options.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn fast_options(max_retries: u32) -> RetryOptions {
        RetryOptions::new(max_retries, Duration::from_millis(10), 2.0)
    }

    #[test]
    fn test_retry_options_default() {
        let options = RetryOptions::default();
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.base_delay, Duration::from_millis(1000));
        assert_eq!(options.multiplier, 2.0);
    }

    #[test]
    fn test_first_retry_waits_base_delay() {
        let options = RetryOptions::default();
        assert_eq!(options.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(options.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(options.delay_for_attempt(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_custom_multiplier() {
        let options = RetryOptions::new(5, Duration::from_millis(100), 3.0);
        assert_eq!(options.delay_for_attempt(3), Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        for n in 1..=4u32 {
            let calls = Arc::new(AtomicU32::new(0));
            let c = calls.clone();

            let result: Result<&str, String> = with_retry(&fast_options(4), || {
                let c = c.clone();
                async move {
                    let call = c.fetch_add(1, Ordering::SeqCst) + 1;
                    if call < n { Err(format!("fail {}", call)) } else { Ok("done") }
                }
            })
            .await;

            assert_eq!(result, Ok("done"));
            assert_eq!(calls.load(Ordering::SeqCst), n);
        }
    }

    #[tokio::test]
    async fn test_always_failing_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result: Result<(), String> = with_retry(&fast_options(3), || {
            let c = c.clone();
            async move {
                let call = c.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("fail {}", call))
            }
        })
        .await;

        assert_eq!(result, Err("fail 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_never_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let mut hooks = 0;

        let result: Result<(), &str> = with_retry_notify(
            &fast_options(1),
            |_, _| hooks += 1,
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("nope")
                }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hooks, 0);
    }

    #[tokio::test]
    async fn test_zero_retries_still_attempts_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result: Result<u8, &str> = with_retry(&fast_options(0), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_on_retry_receives_attempt_and_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let mut seen: Vec<(u32, String)> = Vec::new();

        let result: Result<&str, String> = with_retry_notify(
            &fast_options(5),
            |attempt, err: &String| seen.push((attempt, err.clone())),
            || {
                let c = c.clone();
                async move {
                    let call = c.fetch_add(1, Ordering::SeqCst) + 1;
                    if call < 3 { Err(format!("e{}", call)) } else { Ok("ok") }
                }
            },
        )
        .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(seen, vec![(1, "e1".to_string()), (2, "e2".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule_is_exponential() {
        let start = Instant::now();
        let options = RetryOptions::default();

        let result: Result<(), &str> = with_retry(&options, || async { Err("down") }).await;

        assert!(result.is_err());
        // 1000ms + 2000ms, no sleep after the final attempt
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_returns_without_delay() {
        let start = Instant::now();
        let result: Result<u32, &str> = with_retry(&RetryOptions::default(), || async { Ok(1) }).await;
        assert_eq!(result, Ok(1));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
