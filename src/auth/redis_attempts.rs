// Login attempt records shared across instances through Redis

use crate::auth::throttle::{AttemptStore, LockoutPolicy, LoginAttemptRecord};
use crate::errors::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::{aio::ConnectionManager, AsyncCommands, Script};

const ATTEMPT_PREFIX: &str = "warden:login_attempts:";

// Apply one failure atomically. `locked_until` of 0 means no lockout.
// Returns {count, window_started_at, locked_until}.
static RECORD_FAILURE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        local key = KEYS[1]
        local now = tonumber(ARGV[1])
        local max_attempts = tonumber(ARGV[2])
        local duration_ms = tonumber(ARGV[3])

        local count = tonumber(redis.call('HGET', key, 'count'))
        local started = tonumber(redis.call('HGET', key, 'window_started_at'))
        local locked_until = tonumber(redis.call('HGET', key, 'locked_until')) or 0

        local stale
        if count == nil or started == nil then
            stale = true
        elseif locked_until > 0 then
            stale = now >= locked_until
        else
            stale = now > started + duration_ms
        end

        if stale then
            count = 1
            started = now
            locked_until = 0
        else
            count = count + 1
        end

        -- A running lockout is never extended
        if locked_until == 0 and count >= max_attempts then
            locked_until = now + duration_ms
        end

        redis.call('HSET', key, 'count', count, 'window_started_at', started,
            'locked_until', locked_until)

        local expires_at = started + duration_ms
        if locked_until > 0 then
            expires_at = locked_until
        end
        redis.call('PEXPIRE', key, math.max(expires_at - now, 1) + 60000)

        return {count, started, locked_until}
        "#,
    )
});

/// Attempt store shared by every instance pointing at the same Redis
#[derive(Clone)]
pub struct RedisAttemptStore {
    redis: ConnectionManager,
}

impl RedisAttemptStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    fn key(key: &str) -> String {
        format!("{}{}", ATTEMPT_PREFIX, key)
    }
}

fn lock_from_redis(locked_until: i64) -> Option<i64> {
    (locked_until > 0).then_some(locked_until)
}

#[async_trait]
impl AttemptStore for RedisAttemptStore {
    async fn get(&self, key: &str) -> Result<Option<LoginAttemptRecord>> {
        let mut conn = self.redis.clone();
        let (count, window_started_at, locked_until): (Option<u32>, Option<i64>, Option<i64>) =
            redis::cmd("HMGET")
                .arg(Self::key(key))
                .arg("count")
                .arg("window_started_at")
                .arg("locked_until")
                .query_async(&mut conn)
                .await?;

        Ok(match (count, window_started_at) {
            (Some(count), Some(window_started_at)) => Some(LoginAttemptRecord {
                count,
                window_started_at,
                locked_until: lock_from_redis(locked_until.unwrap_or(0)),
            }),
            _ => None,
        })
    }

    async fn record_failure(
        &self,
        key: &str,
        now_ms: i64,
        policy: &LockoutPolicy,
    ) -> Result<LoginAttemptRecord> {
        let mut conn = self.redis.clone();
        let (count, window_started_at, locked_until): (u32, i64, i64) = RECORD_FAILURE_SCRIPT
            .key(Self::key(key))
            .arg(now_ms)
            .arg(policy.max_attempts)
            .arg(policy.lockout_duration_ms)
            .invoke_async(&mut conn)
            .await?;

        Ok(LoginAttemptRecord {
            count,
            window_started_at,
            locked_until: lock_from_redis(locked_until),
        })
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let _: () = conn.del(Self::key(key)).await?;
        Ok(())
    }

    async fn evict_expired(&self, _now_ms: i64, _policy: &LockoutPolicy) -> Result<usize> {
        // Records carry a PEXPIRE
        Ok(0)
    }
}
