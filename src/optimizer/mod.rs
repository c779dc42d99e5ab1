//! Throughput primitives for bulk posting.
//!
//! This module provides:
//! - **Retry**: exponential backoff around any fallible async operation.
//! - **Media cache**: bounded TTL cache of uploaded payloads and their URLs.
//! - **Rate limiting**: a sliding 60 second window shared by every series.
//! - **Batching**: chunked fan-out/fan-in with per-item error isolation.
//!
//! The cache and the limiter are meant to be created once per process and
//! shared by `Arc`.

mod batch;
mod cache;
mod rate_limit;
mod retry;

pub use batch::{BatchItemError, BatchOptions, BatchOutcome, DEFAULT_CONCURRENCY, DELAY_BETWEEN_POSTS, process_in_parallel};
pub use cache::{CACHE_CAPACITY, CACHE_TTL, CacheEntry, MediaCache};
pub use rate_limit::{GlobalRateLimiter, RATE_LIMIT_WINDOW, RateLimitTier, SLOT_SAFETY_MARGIN};
pub use retry::{BACKOFF_MULTIPLIER, BASE_DELAY, MAX_RETRIES, RetryOptions, with_retry, with_retry_notify};
