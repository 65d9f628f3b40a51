use crate::config::RateLimitPolicy;
use crate::errors::Result;
use crate::rate_limit::fixed_window::{RateLimitDecision, RateLimitStore, WindowRecord};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::{aio::ConnectionManager, AsyncCommands, Script};

const RATE_LIMIT_PREFIX: &str = "warden:ratelimit:";

// Fixed-window check-and-increment, evaluated atomically by Redis.
// Returns {allowed, count, reset_at_ms}.
static FIXED_WINDOW_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        local key = KEYS[1]
        local now = tonumber(ARGV[1])
        local limit = tonumber(ARGV[2])
        local window_ms = tonumber(ARGV[3])

        local count = tonumber(redis.call('HGET', key, 'count'))
        local reset_at = tonumber(redis.call('HGET', key, 'reset_at'))

        -- Start a new window when none exists or the old one is strictly past
        if count == nil or reset_at == nil or now > reset_at then
            reset_at = now + window_ms
            redis.call('HSET', key, 'count', 1, 'reset_at', reset_at)
            -- Keep the record a little past the window so late readers still see it
            redis.call('PEXPIRE', key, window_ms + 60000)
            return {1, 1, reset_at}
        end

        if count < limit then
            count = redis.call('HINCRBY', key, 'count', 1)
            return {1, count, reset_at}
        end

        return {0, count, reset_at}
        "#,
    )
});

/// Counter store shared across instances
#[derive(Clone)]
pub struct RedisRateLimitStore {
    redis: ConnectionManager,
}

impl RedisRateLimitStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    fn key(key: &str) -> String {
        format!("{}{}", RATE_LIMIT_PREFIX, key)
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        policy: &RateLimitPolicy,
        now_ms: i64,
    ) -> Result<RateLimitDecision> {
        let mut conn = self.redis.clone();

        tracing::debug!(
            key = %key,
            limit = %policy.max_requests,
            window_seconds = %policy.window_seconds,
            "Checking rate limit"
        );

        let (allowed, count, reset_at_ms): (i64, u64, i64) = FIXED_WINDOW_SCRIPT
            .key(Self::key(key))
            .arg(now_ms)
            .arg(policy.max_requests)
            .arg(policy.window_ms())
            .invoke_async(&mut conn)
            .await?;

        let allowed = allowed == 1;
        Ok(RateLimitDecision {
            allowed,
            limit: policy.max_requests,
            remaining: if allowed {
                policy.max_requests.saturating_sub(count)
            } else {
                0
            },
            reset_at_ms,
            count,
        })
    }

    async fn get(&self, key: &str) -> Result<Option<WindowRecord>> {
        let mut conn = self.redis.clone();
        let (count, reset_at_ms): (Option<u64>, Option<i64>) = redis::cmd("HMGET")
            .arg(Self::key(key))
            .arg("count")
            .arg("reset_at")
            .query_async(&mut conn)
            .await?;

        Ok(match (count, reset_at_ms) {
            (Some(count), Some(reset_at_ms)) => Some(WindowRecord { count, reset_at_ms }),
            _ => None,
        })
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let _: () = conn.del(Self::key(key)).await?;

        tracing::info!(key = %key, "Rate limit reset");

        Ok(())
    }

    async fn evict_expired(&self, _now_ms: i64) -> Result<usize> {
        // Keys carry a PEXPIRE, Redis evicts them itself
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> RedisRateLimitStore {
        let config = crate::config::RedisConfig {
            url: "redis://localhost:6379".to_string(),
        };
        let redis = crate::redis::create_client(&config).await.unwrap();
        RedisRateLimitStore::new(redis)
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_fixed_window_basic() {
        let store = store().await;
        let key = "test:fixed_window:basic";
        let policy = RateLimitPolicy::new(5, 60);
        let now = 1_700_000_000_000;

        // Clean up first
        store.reset(key).await.unwrap();

        for i in 1..=5 {
            let decision = store.hit(key, &policy, now).await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.count, i);
        }

        let denied = store.hit(key, &policy, now + 1).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.reset_at_ms, now + 60_000);

        let fresh = store.hit(key, &policy, now + 60_001).await.unwrap();
        assert!(fresh.allowed);
        assert_eq!(fresh.count, 1);

        store.reset(key).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_get_missing_key() {
        let store = store().await;
        assert!(store.get("test:fixed_window:missing").await.unwrap().is_none());
    }
}
