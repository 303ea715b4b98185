/// Upload rate limiting.
///
/// The limiter is an injected capability rather than a module-level
/// singleton so handlers stay testable and backends stay pluggable. The
/// Redis implementation shares one window across instances; the in-memory
/// implementation is the best-effort dev fallback and under-enforces when
/// multiple instances run.
use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window_seconds: 3600,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after_secs: u64 },
}

/// Check-and-increment in one call. Implementations fail open: a limiter
/// backend outage must not block uploads, only under-enforce.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check_and_increment(&self, client_key: &str) -> RateDecision;
}

pub struct RedisRateLimiter {
    redis: ConnectionManager,
    config: RateLimitConfig,
}

impl RedisRateLimiter {
    pub fn new(redis: ConnectionManager, config: RateLimitConfig) -> Self {
        Self { redis, config }
    }

    async fn try_increment(&self, client_key: &str) -> Result<RateDecision, redis::RedisError> {
        let mut conn = self.redis.clone();
        let key = format!("rate_limit:{client_key}");

        let count: u32 = conn.incr(&key, 1).await?;
        if count == 1 {
            let _: () = conn.expire(&key, self.config.window_seconds as i64).await?;
        }

        if count > self.config.max_requests {
            let ttl: i64 = conn.ttl(&key).await.unwrap_or(-1);
            let retry_after_secs = if ttl > 0 {
                ttl as u64
            } else {
                self.config.window_seconds
            };
            return Ok(RateDecision::Limited { retry_after_secs });
        }

        Ok(RateDecision::Allowed)
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check_and_increment(&self, client_key: &str) -> RateDecision {
        match self.try_increment(client_key).await {
            Ok(decision) => decision,
            Err(err) => {
                tracing::warn!(error = %err, "rate limiter unavailable, allowing request");
                RateDecision::Allowed
            }
        }
    }
}

struct Window {
    count: u32,
    reset_at: Instant,
}

/// Process-local rolling window. Counters reset on restart and are not
/// shared between instances.
pub struct InMemoryRateLimiter {
    windows: DashMap<String, Window>,
    config: RateLimitConfig,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check_and_increment(&self, client_key: &str) -> RateDecision {
        let window = Duration::from_secs(self.config.window_seconds);
        let now = Instant::now();

        let mut entry = self
            .windows
            .entry(client_key.to_string())
            .or_insert_with(|| Window {
                count: 0,
                reset_at: now + window,
            });

        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + window;
        }

        entry.count += 1;
        if entry.count > self.config.max_requests {
            let retry_after_secs = entry.reset_at.saturating_duration_since(now).as_secs().max(1);
            RateDecision::Limited { retry_after_secs }
        } else {
            RateDecision::Allowed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_limits_after_cap() {
        let limiter = InMemoryRateLimiter::new(RateLimitConfig {
            max_requests: 2,
            window_seconds: 3600,
        });

        assert_eq!(
            limiter.check_and_increment("ip:1.2.3.4").await,
            RateDecision::Allowed
        );
        assert_eq!(
            limiter.check_and_increment("ip:1.2.3.4").await,
            RateDecision::Allowed
        );
        match limiter.check_and_increment("ip:1.2.3.4").await {
            RateDecision::Limited { retry_after_secs } => {
                assert!(retry_after_secs > 0 && retry_after_secs <= 3600);
            }
            other => panic!("expected Limited, got {other:?}"),
        }

        // Separate clients have separate windows
        assert_eq!(
            limiter.check_and_increment("ip:5.6.7.8").await,
            RateDecision::Allowed
        );
    }

    #[tokio::test]
    async fn test_in_memory_window_resets() {
        let limiter = InMemoryRateLimiter::new(RateLimitConfig {
            max_requests: 1,
            window_seconds: 0,
        });

        assert_eq!(
            limiter.check_and_increment("ip:1.2.3.4").await,
            RateDecision::Allowed
        );
        // zero-length window: the counter resets on every check
        assert_eq!(
            limiter.check_and_increment("ip:1.2.3.4").await,
            RateDecision::Allowed
        );
    }
}
