//! Bounded TTL cache for processed media.
//!
//! Maps an opaque file id to the payload that was uploaded and the URL the
//! posting service assigned to it, so a file posted by several series is only
//! fetched and uploaded once per hour.
//!
//! Eviction is by insertion order, not access order: reading an entry never
//! moves it, and overwriting an id keeps its original slot.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;

/// Default maximum number of entries.
pub const CACHE_CAPACITY: usize = 100;

/// Default time an entry stays valid.
pub const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// A cached upload.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Payload that was uploaded.
    pub buffer: Bytes,
    /// URL returned by the media endpoint.
    pub url: String,
    /// When the entry was written.
    pub created_at: Instant,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
}

impl CacheInner {
    fn remove(&mut self, file_id: &str) {
        if self.entries.remove(file_id).is_some() {
            self.order.retain(|id| id != file_id);
        }
    }
}

/// Shared media cache.
#[derive(Debug)]
pub struct MediaCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    ttl: Duration,
}

impl MediaCache {
    /// Create a cache with the default capacity and TTL.
    pub fn new() -> Self {
        Self::with_limits(CACHE_CAPACITY, CACHE_TTL)
    }

    /// Create a cache with custom limits. A capacity of 0 is treated as 1.
    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Look up a file. Stale entries are dropped and reported as missing.
    pub fn get(&self, file_id: &str) -> Option<CacheEntry> {
        let mut inner = self.inner.lock();

        let entry = inner.entries.get(file_id)?;
        if entry.created_at.elapsed() < self.ttl {
            tracing::debug!(file_id, "Media cache hit");
            return Some(entry.clone());
        }

        tracing::debug!(file_id, "Media cache entry expired");
        inner.remove(file_id);
        None
    }

    /// Store a processed file and its remote URL.
    pub fn put(&self, file_id: impl Into<String>, buffer: Bytes, url: impl Into<String>) {
        let file_id = file_id.into();
        let entry = CacheEntry {
            buffer,
            url: url.into(),
            created_at: Instant::now(),
        };

        let mut inner = self.inner.lock();

        if let Some(existing) = inner.entries.get_mut(&file_id) {
            *existing = entry;
            return;
        }

        if inner.entries.len() >= self.capacity
            && let Some(oldest) = inner.order.pop_front()
        {
            tracing::debug!(file_id = %oldest, "Evicting oldest media cache entry");
            inner.entries.remove(&oldest);
        }

        inner.order.push_back(file_id.clone());
        inner.entries.insert(file_id, entry);
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Whether an entry exists for `file_id`, stale or not.
    pub fn contains(&self, file_id: &str) -> bool {
        self.inner.lock().entries.contains_key(file_id)
    }

    /// Number of stored entries, including ones not yet found stale.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MediaCache {
    fn default() -> Self {
        Self::new()
    }
}
