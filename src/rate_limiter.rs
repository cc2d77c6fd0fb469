use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Token bucket for rate limiting
struct TokenBucket {
    tokens: f32,
    max_tokens: f32,
    refill_rate: f32, // tokens per second
    last_update: Instant,
}

impl TokenBucket {
    fn new(per_minute: f32) -> Self {
        Self {
            tokens: per_minute,
            max_tokens: per_minute,
            refill_rate: per_minute / 60.0,
            last_update: Instant::now(),
        }
    }

    fn try_consume(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f32();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_update = now;
    }
}

/// What a chat user is asking for
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum LimitType {
    Page,   // next page, jump to page
    Upload, // document upload
}

/// Per-user rate limiter. Burst size is one minute worth of requests.
pub struct RateLimiter {
    buckets: Mutex<HashMap<(String, LimitType), TokenBucket>>,
    pages_per_minute: f32,
    uploads_per_minute: f32,
}

impl RateLimiter {
    pub fn new(pages: u32, uploads: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            pages_per_minute: pages as f32,
            uploads_per_minute: uploads as f32,
        }
    }

    fn limit(&self, limit_type: LimitType) -> f32 {
        match limit_type {
            LimitType::Page => self.pages_per_minute,
            LimitType::Upload => self.uploads_per_minute,
        }
    }

    fn buckets(&self) -> MutexGuard<'_, HashMap<(String, LimitType), TokenBucket>> {
        // a panic while holding the lock leaves the map usable
        self.buckets.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns true and consumes a token if the request is allowed.
    pub fn check(&self, user: &str, limit_type: LimitType) -> bool {
        let limit = self.limit(limit_type);
        let mut buckets = self.buckets();
        let bucket = buckets
            .entry((user.to_string(), limit_type))
            .or_insert_with(|| TokenBucket::new(limit));

        let allowed = bucket.try_consume();
        if !allowed {
            tracing::warn!(user, ?limit_type, "rate limited");
        }
        allowed
    }

    /// Tokens left for a user, for diagnostics
    pub fn remaining(&self, user: &str, limit_type: LimitType) -> f32 {
        self.buckets()
            .get(&(user.to_string(), limit_type))
            .map(|b| b.tokens)
            .unwrap_or_else(|| self.limit(limit_type))
    }

    /// Drops buckets of users not seen for `max_age_secs`.
    pub fn cleanup(&self, max_age_secs: u64) {
        let now = Instant::now();
        self.buckets()
            .retain(|_, bucket| now.duration_since(bucket.last_update).as_secs() < max_age_secs);
    }

    pub fn tracked(&self) -> usize {
        self.buckets().len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(20, 5)
    }
}
