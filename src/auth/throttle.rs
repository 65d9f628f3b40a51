// Failed-login tracking and temporary lockout

use crate::auth::validation::normalize_identifier;
use crate::clock::SharedClock;
use crate::config::AuthConfig;
use crate::errors::Result;
use crate::observability::MetricsRecorder;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Threshold and duration of a lockout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lockout_duration_ms: i64,
}

impl LockoutPolicy {
    pub fn new(max_attempts: u32, lockout_duration_ms: i64) -> Self {
        Self {
            max_attempts,
            lockout_duration_ms,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.max_login_attempts,
            config.lockout_duration_seconds * 1000,
        )
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::new(5, 15 * 60 * 1000)
    }
}

/// Failures recorded for one normalized identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginAttemptRecord {
    pub count: u32,
    /// First failure of the current window (ms)
    pub window_started_at: i64,
    /// Set once `count` reaches the threshold (ms)
    pub locked_until: Option<i64>,
}

impl LoginAttemptRecord {
    fn first_failure(now_ms: i64, policy: &LockoutPolicy) -> Self {
        Self {
            count: 1,
            window_started_at: now_ms,
            locked_until: None,
        }
        .lock_if_exhausted(now_ms, policy)
    }

    /// The record after one more failure at `now_ms`
    pub fn apply_failure(self, now_ms: i64, policy: &LockoutPolicy) -> Self {
        if self.is_stale(now_ms, policy) {
            return Self::first_failure(now_ms, policy);
        }
        Self {
            count: self.count.saturating_add(1),
            ..self
        }
        .lock_if_exhausted(now_ms, policy)
    }

    // A running lockout is never extended
    fn lock_if_exhausted(mut self, now_ms: i64, policy: &LockoutPolicy) -> Self {
        if self.locked_until.is_none() && self.count >= policy.max_attempts {
            self.locked_until = Some(now_ms + policy.lockout_duration_ms);
        }
        self
    }

    /// A stale record behaves as if absent
    pub fn is_stale(&self, now_ms: i64, policy: &LockoutPolicy) -> bool {
        match self.locked_until {
            Some(until) => now_ms >= until,
            None => now_ms > self.window_started_at + policy.lockout_duration_ms,
        }
    }

    pub fn lock_status(&self, now_ms: i64) -> LockStatus {
        match self.locked_until {
            Some(until) if now_ms < until => LockStatus {
                locked: true,
                remaining_ms: until - now_ms,
            },
            _ => LockStatus::UNLOCKED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatus {
    pub locked: bool,
    pub remaining_ms: i64,
}

impl LockStatus {
    pub const UNLOCKED: LockStatus = LockStatus {
        locked: false,
        remaining_ms: 0,
    };
}

/// Storage for login attempt records
///
/// `record_failure` must apply its read-modify-write atomically per key.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<LoginAttemptRecord>>;

    /// Apply one failure and return the updated record
    async fn record_failure(
        &self,
        key: &str,
        now_ms: i64,
        policy: &LockoutPolicy,
    ) -> Result<LoginAttemptRecord>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Drop stale records; returns how many were removed
    async fn evict_expired(&self, now_ms: i64, policy: &LockoutPolicy) -> Result<usize>;
}

/// Single-process attempt store
///
/// Multi-instance deployments need a shared store, otherwise each instance
/// grants its own budget of attempts.
#[derive(Debug, Default)]
pub struct InMemoryAttemptStore {
    records: DashMap<String, LoginAttemptRecord>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn get(&self, key: &str) -> Result<Option<LoginAttemptRecord>> {
        Ok(self.records.get(key).map(|r| *r))
    }

    async fn record_failure(
        &self,
        key: &str,
        now_ms: i64,
        policy: &LockoutPolicy,
    ) -> Result<LoginAttemptRecord> {
        // The entry guard holds the shard lock for the whole update
        let record = match self.records.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                *record = record.apply_failure(now_ms, policy);
                *record
            }
            Entry::Vacant(vacant) => *vacant.insert(LoginAttemptRecord::first_failure(now_ms, policy)),
        };
        Ok(record)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.records.remove(key);
        Ok(())
    }

    async fn evict_expired(&self, now_ms: i64, policy: &LockoutPolicy) -> Result<usize> {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_stale(now_ms, policy));
        Ok(before.saturating_sub(self.records.len()))
    }
}

/// Per-identifier login throttle
///
/// Identifiers are normalized before every lookup, so `User@Example.com` and
/// `user@example.com` share one record. Failures count the same whether or not
/// the account exists.
pub struct LoginThrottle {
    store: Arc<dyn AttemptStore>,
    policy: LockoutPolicy,
    clock: SharedClock,
}

impl LoginThrottle {
    pub fn new(store: Arc<dyn AttemptStore>, policy: LockoutPolicy, clock: SharedClock) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    /// In-memory throttle
    pub fn in_memory(policy: LockoutPolicy, clock: SharedClock) -> Self {
        Self::new(Arc::new(InMemoryAttemptStore::new()), policy, clock)
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    pub async fn is_locked(&self, identifier: &str) -> Result<LockStatus> {
        let key = normalize_identifier(identifier);
        let now = self.clock.now_ms();
        Ok(self
            .store
            .get(&key)
            .await?
            .map(|record| record.lock_status(now))
            .unwrap_or(LockStatus::UNLOCKED))
    }

    /// Count a failure; the lockout starts at the failure that reaches the threshold
    pub async fn record_failure(&self, identifier: &str) -> Result<LockStatus> {
        let key = normalize_identifier(identifier);
        let now = self.clock.now_ms();
        let record = self.store.record_failure(&key, now, &self.policy).await?;

        if record.count == self.policy.max_attempts && record.locked_until.is_some() {
            MetricsRecorder::record_lockout();
            tracing::warn!(
                identifier = %key,
                attempts = record.count,
                lockout_ms = self.policy.lockout_duration_ms,
                "Identifier locked out after repeated login failures"
            );
        } else {
            tracing::debug!(identifier = %key, attempts = record.count, "Login failure recorded");
        }

        Ok(record.lock_status(now))
    }

    /// Forget every failure for the identifier
    pub async fn record_success(&self, identifier: &str) -> Result<()> {
        self.store.remove(&normalize_identifier(identifier)).await
    }

    /// Failures in the current window; `None` when the record is absent or stale
    pub async fn attempt_count(&self, identifier: &str) -> Result<Option<u32>> {
        let now = self.clock.now_ms();
        Ok(self
            .store
            .get(&normalize_identifier(identifier))
            .await?
            .filter(|record| !record.is_stale(now, &self.policy))
            .map(|record| record.count))
    }

    pub async fn evict_expired(&self) -> Result<usize> {
        self.store
            .evict_expired(self.clock.now_ms(), &self.policy)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const FIFTEEN_MINUTES_MS: i64 = 15 * 60 * 1000;

    fn throttle() -> (LoginThrottle, ManualClock) {
        let clock = ManualClock::new(1_700_000_000_000);
        let throttle = LoginThrottle::in_memory(
            LockoutPolicy::new(5, FIFTEEN_MINUTES_MS),
            Arc::new(clock.clone()),
        );
        (throttle, clock)
    }

    async fn fail(throttle: &LoginThrottle, identifier: &str, times: usize) -> LockStatus {
        let mut status = LockStatus::UNLOCKED;
        for _ in 0..times {
            status = throttle.record_failure(identifier).await.unwrap();
        }
        status
    }

    #[tokio::test]
    async fn test_success_clears_failures() {
        let (throttle, _) = throttle();
        fail(&throttle, "user@example.com", 4).await;
        assert_eq!(throttle.attempt_count("user@example.com").await.unwrap(), Some(4));

        throttle.record_success("user@example.com").await.unwrap();
        assert!(!throttle.is_locked("user@example.com").await.unwrap().locked);
        assert_eq!(throttle.attempt_count("user@example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lockout_after_threshold() {
        let (throttle, clock) = throttle();
        for _ in 0..4 {
            assert!(!throttle.record_failure("user@example.com").await.unwrap().locked);
        }
        assert!(throttle.record_failure("user@example.com").await.unwrap().locked);

        clock.advance_ms(1);
        let status = throttle.is_locked("user@example.com").await.unwrap();
        assert!(status.locked);
        assert!(status.remaining_ms > 0);
        assert!(status.remaining_ms <= FIFTEEN_MINUTES_MS);
    }

    #[tokio::test]
    async fn test_failures_while_locked_do_not_extend() {
        let (throttle, clock) = throttle();
        fail(&throttle, "user@example.com", 5).await;
        clock.advance_ms(10 * 60 * 1000);
        fail(&throttle, "user@example.com", 2).await;

        let status = throttle.is_locked("user@example.com").await.unwrap();
        assert!(status.locked);
        assert_eq!(status.remaining_ms, 5 * 60 * 1000);
    }

    #[tokio::test]
    async fn test_lockout_expires() {
        let (throttle, clock) = throttle();
        fail(&throttle, "user@example.com", 5).await;
        clock.advance_ms(FIFTEEN_MINUTES_MS - 1);
        assert!(throttle.is_locked("user@example.com").await.unwrap().locked);

        clock.advance_ms(1);
        assert!(!throttle.is_locked("user@example.com").await.unwrap().locked);
        assert_eq!(throttle.attempt_count("user@example.com").await.unwrap(), None);

        // Next failure starts a fresh window
        assert!(!throttle.record_failure("user@example.com").await.unwrap().locked);
        assert_eq!(throttle.attempt_count("user@example.com").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_identifiers_are_normalized() {
        let (throttle, _) = throttle();
        fail(&throttle, "User@Example.com", 1).await;
        fail(&throttle, "user@example.com", 1).await;
        fail(&throttle, "  USER@EXAMPLE.COM ", 1).await;

        assert_eq!(throttle.attempt_count("user@example.com").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_unlocked_window_expires() {
        let (throttle, clock) = throttle();
        fail(&throttle, "user@example.com", 4).await;
        clock.advance_ms(FIFTEEN_MINUTES_MS + 1);
        assert!(!throttle.record_failure("user@example.com").await.unwrap().locked);
        assert_eq!(throttle.attempt_count("user@example.com").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_eviction_removes_stale_records() {
        let (throttle, clock) = throttle();
        fail(&throttle, "a@example.com", 1).await;
        fail(&throttle, "b@example.com", 5).await;
        clock.advance_ms(FIFTEEN_MINUTES_MS + 1);
        fail(&throttle, "c@example.com", 1).await;

        assert_eq!(throttle.evict_expired().await.unwrap(), 2);
        assert_eq!(throttle.attempt_count("c@example.com").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_instances_sharing_a_store_share_the_budget() {
        let clock: SharedClock = Arc::new(ManualClock::new(1_700_000_000_000));
        let store: Arc<dyn AttemptStore> = Arc::new(InMemoryAttemptStore::new());
        let policy = LockoutPolicy::new(5, FIFTEEN_MINUTES_MS);
        let first = LoginThrottle::new(store.clone(), policy, clock.clone());
        let second = LoginThrottle::new(store, policy, clock);

        fail(&first, "user@example.com", 3).await;
        assert!(!fail(&second, "user@example.com", 1).await.locked);
        assert!(fail(&second, "user@example.com", 1).await.locked);
        assert!(first.is_locked("user@example.com").await.unwrap().locked);
    }

    #[test]
    fn test_apply_failure_single_attempt_policy() {
        let policy = LockoutPolicy::new(1, 1_000);
        let record = LoginAttemptRecord::first_failure(0, &policy);
        assert_eq!(record.locked_until, Some(1_000));

        // Once the lock lapses the next failure locks again from scratch
        let record = record.apply_failure(1_000, &policy);
        assert_eq!(record.count, 1);
        assert_eq!(record.locked_until, Some(2_000));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_are_all_counted() {
        let (throttle, _) = throttle();
        let throttle = Arc::new(LoginThrottle::new(
            Arc::new(InMemoryAttemptStore::new()),
            LockoutPolicy::new(1_000, FIFTEEN_MINUTES_MS),
            throttle.clock.clone(),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let throttle = throttle.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        throttle.record_failure("shared@example.com").await.unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(
            throttle.attempt_count("shared@example.com").await.unwrap(),
            Some(400)
        );
    }
}
