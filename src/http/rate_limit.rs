//! Rate limiting implementation
//!
//! Sliding-window log: at most `max_calls` grants inside any rolling
//! `period`. One instance is shared by every resource worker talking to the
//! same upstream, so all of them draw from a single call budget.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Configuration for rate limiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Maximum grants per rolling period
    #[serde(default = "default_max_calls")]
    pub max_calls: u32,
    /// Length of the rolling period in seconds
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
}

fn default_max_calls() -> u32 {
    30
}

fn default_period_secs() -> u64 {
    60
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_calls: default_max_calls(),
            period_secs: default_period_secs(),
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(max_calls: u32, period_secs: u64) -> Self {
        Self {
            max_calls,
            period_secs,
        }
    }

    /// Rolling period as a duration
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

/// Sliding-window rate limiter
///
/// Waiters queue on a FIFO mutex; the head of the queue sleeps while holding
/// it, so slots are handed out in arrival order and nobody starves.
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self::with_period(config.max_calls, config.period())
    }

    /// Create a limiter from raw values (`max_calls` is clamped to at least 1)
    pub fn with_period(max_calls: u32, period: Duration) -> Self {
        let max_calls = max_calls.max(1) as usize;
        Self {
            max_calls,
            period,
            grants: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// Wait until a call slot is available, then take it
    pub async fn acquire(&self) {
        let mut grants = self.grants.lock().await;
        loop {
            let now = Instant::now();
            self.evict_expired(&mut grants, now);

            if grants.len() < self.max_calls {
                grants.push_back(now);
                return;
            }

            // Full window: the oldest grant decides when the next slot opens.
            let oldest = grants.front().copied().unwrap_or(now);
            let wait = self.period.saturating_sub(now.duration_since(oldest));
            trace!(wait_ms = wait.as_millis() as u64, "rate limit window full");
            tokio::time::sleep(wait).await;
        }
    }

    /// Take a slot if one is free right now
    pub fn try_acquire(&self) -> bool {
        let Ok(mut grants) = self.grants.try_lock() else {
            return false;
        };
        let now = Instant::now();
        self.evict_expired(&mut grants, now);
        if grants.len() < self.max_calls {
            grants.push_back(now);
            true
        } else {
            false
        }
    }

    /// Slots free in the current window
    pub async fn available(&self) -> usize {
        let mut grants = self.grants.lock().await;
        self.evict_expired(&mut grants, Instant::now());
        self.max_calls - grants.len()
    }

    /// Maximum grants per period
    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    /// Rolling period
    pub fn period(&self) -> Duration {
        self.period
    }

    fn evict_expired(&self, grants: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = grants.front() {
            if now.duration_since(oldest) >= self.period {
                grants.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimiterConfig::default())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_calls", &self.max_calls)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}
