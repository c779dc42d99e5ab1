//! Global sliding-window rate limiter.
//!
//! Every outbound call to the posting service, from every series in the
//! process, acquires a slot here first. The window is a sliding 60 seconds:
//! a slot frees up as soon as the request that used it is 60 seconds old, so
//! there is no fixed per-minute boundary where all callers wake at once.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Length of the sliding window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Extra wait added after the oldest request leaves the window.
pub const SLOT_SAFETY_MARGIN: Duration = Duration::from_millis(100);

/// Pricing tiers of the posting service, in requests per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitTier {
    Free,
    #[default]
    Build,
    Accelerate,
    Unlimited,
}

impl RateLimitTier {
    pub const ALL: [RateLimitTier; 4] = [
        RateLimitTier::Free,
        RateLimitTier::Build,
        RateLimitTier::Accelerate,
        RateLimitTier::Unlimited,
    ];

    /// Requests allowed per sliding minute.
    pub fn per_minute(&self) -> usize {
        match self {
            RateLimitTier::Free => 60,
            RateLimitTier::Build => 120,
            RateLimitTier::Accelerate => 600,
            RateLimitTier::Unlimited => 1200,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitTier::Free => "free",
            RateLimitTier::Build => "build",
            RateLimitTier::Accelerate => "accelerate",
            RateLimitTier::Unlimited => "unlimited",
        }
    }
}

impl fmt::Display for RateLimitTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateLimitTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(RateLimitTier::Free),
            "build" => Ok(RateLimitTier::Build),
            "accelerate" => Ok(RateLimitTier::Accelerate),
            "unlimited" => Ok(RateLimitTier::Unlimited),
            other => Err(format!("unknown rate limit tier: {}", other)),
        }
    }
}

/// Timestamps of granted slots plus the current cap.
#[derive(Debug)]
struct RateLimitWindow {
    requests: VecDeque<Instant>,
    limit: usize,
}

impl RateLimitWindow {
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.requests.front() {
            if now.duration_since(oldest) >= RATE_LIMIT_WINDOW {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Rate limiter shared by all series in the process.
#[derive(Debug)]
pub struct GlobalRateLimiter {
    window: Mutex<RateLimitWindow>,
}

impl GlobalRateLimiter {
    /// Create a limiter at the default (build) tier.
    pub fn new() -> Self {
        Self::with_limit(RateLimitTier::default().per_minute())
    }

    /// Create a limiter with an explicit per-minute cap.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            window: Mutex::new(RateLimitWindow {
                requests: VecDeque::new(),
                limit,
            }),
        }
    }

    /// Create a limiter for a pricing tier.
    pub fn for_tier(tier: RateLimitTier) -> Self {
        Self::with_limit(tier.per_minute())
    }

    /// Replace the per-minute cap.
    pub fn set_limit(&self, limit: usize) {
        self.window.lock().limit = limit;
        tracing::info!(limit, "Rate limit updated");
    }

    /// Switch to a pricing tier.
    pub fn set_tier(&self, tier: RateLimitTier) {
        self.set_limit(tier.per_minute());
    }

    pub fn limit(&self) -> usize {
        self.window.lock().limit
    }

    /// Wait until a slot is free, then take it.
    ///
    /// Pruning, the capacity check and recording the new request happen under
    /// one lock, so concurrent callers never overshoot the cap. The lock is
    /// released while sleeping.
    pub async fn wait_for_slot(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock();
                let now = Instant::now();
                window.prune(now);

                if window.requests.len() < window.limit {
                    window.requests.push_back(now);
                    tracing::debug!(
                        in_window = window.requests.len(),
                        limit = window.limit,
                        "Rate limit slot granted"
                    );
                    return;
                }

                match window.requests.front() {
                    Some(&oldest) => (oldest + RATE_LIMIT_WINDOW).saturating_duration_since(now) + SLOT_SAFETY_MARGIN,
                    // limit == 0: nothing will ever age out, poll once per window
                    None => RATE_LIMIT_WINDOW,
                }
            };

            tracing::warn!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting for slot");
            tokio::time::sleep(wait).await;
        }
    }

    /// Free slots right now, without taking one.
    pub fn available_slots(&self) -> usize {
        let mut window = self.window.lock();
        window.prune(Instant::now());
        window.limit.saturating_sub(window.requests.len())
    }

    /// Requests granted within the current window.
    pub fn in_window(&self) -> usize {
        let mut window = self.window.lock();
        window.prune(Instant::now());
        window.requests.len()
    }
}

impl Default for GlobalRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
