//! Per-IP token-bucket rate limiting.
//!
//! One bucket per client IP behind a reader-writer lock. Buckets refill at
//! the configured rate up to the burst capacity; idle buckets are evicted
//! on a sweep whenever the map grows past a threshold.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::client_meta::ClientMeta;
use crate::common::{AppError, Clock};

/// Evict buckets idle for longer than this during a sweep.
const IDLE_EVICTION_SECS: i64 = 10 * 60;
/// Sweep once the map grows past this many buckets.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    tokens: f64,
    last_refill: DateTime<Utc>,
}

pub struct RateLimiter {
    buckets: RwLock<HashMap<IpAddr, TokenBucket>>,
    clock: Arc<dyn Clock>,
    rate_per_sec: f64,
    burst: f64,
}

impl RateLimiter {
    /// Defaults per the API contract: 100 requests per second with a burst
    /// capacity of 10.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(clock, 100.0, 10.0)
    }

    pub fn with_limits(clock: Arc<dyn Clock>, rate_per_sec: f64, burst: f64) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            clock,
            rate_per_sec,
            burst,
        }
    }

    /// Take one token for `ip`; false means the caller is over the limit.
    pub async fn allow(&self, ip: IpAddr) -> bool {
        let now = self.clock.now();
        let mut buckets = self.buckets.write().await;

        if buckets.len() > SWEEP_THRESHOLD {
            buckets.retain(|_, bucket| {
                now - bucket.last_refill < Duration::seconds(IDLE_EVICTION_SECS)
            });
        }

        let bucket = buckets.entry(ip).or_insert(TokenBucket {
            tokens: self.burst,
            last_refill: now,
        });

        let elapsed = (now - bucket.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<ClientMeta>()
        .and_then(|meta| meta.ip);

    // A request with no resolvable IP cannot be bucketed; let it through.
    if let Some(ip) = ip {
        if !limiter.allow(ip).await {
            return AppError::TooManyRequests.into_response();
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::FixedClock;

    fn ip() -> IpAddr {
        "203.0.113.7".parse().unwrap()
    }

    #[tokio::test]
    async fn burst_is_honoured_then_exhausted() {
        let clock = Arc::new(FixedClock::new("2025-06-01T10:00:00Z".parse().unwrap()));
        let limiter = RateLimiter::with_limits(clock, 100.0, 10.0);

        for _ in 0..10 {
            assert!(limiter.allow(ip()).await);
        }
        assert!(!limiter.allow(ip()).await);
    }

    #[tokio::test]
    async fn tokens_refill_over_time() {
        let clock = Arc::new(FixedClock::new("2025-06-01T10:00:00Z".parse().unwrap()));
        let limiter = RateLimiter::with_limits(clock.clone(), 100.0, 10.0);

        for _ in 0..10 {
            assert!(limiter.allow(ip()).await);
        }
        assert!(!limiter.allow(ip()).await);

        // 100/s refill: 50 ms buys back five tokens.
        clock.advance(Duration::milliseconds(50));
        for _ in 0..5 {
            assert!(limiter.allow(ip()).await);
        }
        assert!(!limiter.allow(ip()).await);
    }

    #[tokio::test]
    async fn buckets_are_per_ip() {
        let clock = Arc::new(FixedClock::new("2025-06-01T10:00:00Z".parse().unwrap()));
        let limiter = RateLimiter::with_limits(clock, 100.0, 1.0);

        let a: IpAddr = "203.0.113.1".parse().unwrap();
        let b: IpAddr = "203.0.113.2".parse().unwrap();
        assert!(limiter.allow(a).await);
        assert!(!limiter.allow(a).await);
        assert!(limiter.allow(b).await);
    }
}
