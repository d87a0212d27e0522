//! Per-sender token bucket applied to SEND_MSG.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, rate: f64, capacity: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;

        self.tokens = (self.tokens + elapsed * rate).min(capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub struct SendRateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    rate: f64,
    capacity: f64,
    enabled: bool,
}

impl SendRateLimiter {
    pub fn new(enabled: bool, requests_per_second: u32, burst: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            rate: requests_per_second as f64,
            capacity: burst.max(1) as f64,
            enabled,
        }
    }

    pub fn check(&self, user_id: &str) -> bool {
        if !self.enabled {
            return true;
        }
        let mut buckets = self.buckets.lock().expect("rate limiter lock poisoned");
        let bucket = buckets
            .entry(user_id.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity));
        bucket.try_consume(self.rate, self.capacity)
    }

    pub fn purge_stale(&self, max_idle_secs: f64) {
        let mut buckets = self.buckets.lock().expect("rate limiter lock poisoned");
        let now = Instant::now();
        buckets.retain(|_, bucket| {
            now.duration_since(bucket.last_refill).as_secs_f64() < max_idle_secs
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_burst_then_rejects() {
        let limiter = SendRateLimiter::new(true, 10, 5);
        for _ in 0..5 {
            assert!(limiter.check("alice"));
        }
        assert!(!limiter.check("alice"));
        // a different sender has their own bucket
        assert!(limiter.check("bob"));
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let limiter = SendRateLimiter::new(false, 1, 1);
        for _ in 0..100 {
            assert!(limiter.check("alice"));
        }
    }

    #[test]
    fn purge_drops_idle_buckets() {
        let limiter = SendRateLimiter::new(true, 10, 5);
        assert!(limiter.check("alice"));
        limiter.purge_stale(0.0);
        assert!(limiter.buckets.lock().unwrap().is_empty());
    }
}
