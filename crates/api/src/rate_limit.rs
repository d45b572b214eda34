//! Fixed-window request limiter for `POST /api/index` (spec §6: "Rate-limited
//! (default 1000/min)"). Deliberately process-local and not distributed —
//! this bridge has no shared-state rate limiter dependency in its stack.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct RateLimiter {
    limit: u64,
    window_ms: u64,
    window_start_ms: AtomicU64,
    count: AtomicU64,
}

impl RateLimiter {
    pub fn new(limit_per_minute: u64) -> Self {
        Self {
            limit: limit_per_minute,
            window_ms: 60_000,
            window_start_ms: AtomicU64::new(now_ms()),
            count: AtomicU64::new(0),
        }
    }

    /// Returns `true` if the request is admitted under the current window.
    pub fn try_acquire(&self) -> bool {
        let now = now_ms();
        let window_start = self.window_start_ms.load(Ordering::Relaxed);
        if now.saturating_sub(window_start) >= self.window_ms {
            self.window_start_ms.store(now, Ordering::Relaxed);
            self.count.store(0, Ordering::Relaxed);
        }
        self.count.fetch_add(1, Ordering::Relaxed) < self.limit
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_limit_within_a_window() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }
}
