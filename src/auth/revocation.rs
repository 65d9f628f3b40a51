// Optional session revocation
//
// Session tokens are stateless: without a revocation list, logout only clears
// the client copy and a stolen token stays valid until it expires. Deployments
// that need server-side logout enable one of the lists below.

use crate::clock::SharedClock;
use crate::errors::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use redis::{aio::ConnectionManager, AsyncCommands};

const REVOCATION_PREFIX: &str = "warden:revoked:";

#[async_trait]
pub trait RevocationList: Send + Sync {
    /// Revoke a session id until its token would have expired anyway
    async fn revoke(&self, session_id: &str, ttl_seconds: i64) -> Result<()>;

    async fn is_revoked(&self, session_id: &str) -> Result<bool>;

    /// Whether revocations are actually remembered
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Stateless default: nothing is ever revoked
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRevocation;

#[async_trait]
impl RevocationList for NoRevocation {
    async fn revoke(&self, session_id: &str, _ttl_seconds: i64) -> Result<()> {
        tracing::debug!(
            session_id = %session_id,
            "Revocation disabled; token remains valid until expiry"
        );
        Ok(())
    }

    async fn is_revoked(&self, _session_id: &str) -> Result<bool> {
        Ok(false)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Single-process revocation list
pub struct InMemoryRevocationList {
    // session id -> revocation expiry (ms)
    entries: DashMap<String, i64>,
    clock: SharedClock,
}

impl InMemoryRevocationList {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Drop revocations whose tokens have expired; returns how many were removed
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, until| *until > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RevocationList for InMemoryRevocationList {
    async fn revoke(&self, session_id: &str, ttl_seconds: i64) -> Result<()> {
        let until = self.clock.now_ms() + ttl_seconds.max(0) * 1000;
        self.entries.insert(session_id.to_string(), until);
        Ok(())
    }

    async fn is_revoked(&self, session_id: &str) -> Result<bool> {
        let now = self.clock.now_ms();
        Ok(self
            .entries
            .get(session_id)
            .map(|until| *until > now)
            .unwrap_or(false))
    }
}

/// Revocation list shared across instances through Redis
#[derive(Clone)]
pub struct RedisRevocationList {
    manager: ConnectionManager,
}

impl RedisRevocationList {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    fn key(session_id: &str) -> String {
        format!("{}{}", REVOCATION_PREFIX, session_id)
    }
}

#[async_trait]
impl RevocationList for RedisRevocationList {
    async fn revoke(&self, session_id: &str, ttl_seconds: i64) -> Result<()> {
        let mut conn = self.manager.clone();
        let ttl = ttl_seconds.max(1) as u64;
        conn.set_ex::<_, _, ()>(Self::key(session_id), "1", ttl).await?;
        Ok(())
    }

    async fn is_revoked(&self, session_id: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let exists: bool = conn.exists(Self::key(session_id)).await?;
        Ok(exists)
    }
}
