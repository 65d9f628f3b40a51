use crate::config::RateLimitPolicy;
use crate::errors::{ceil_secs, Result};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Counter state for one (route class, client) key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRecord {
    pub count: u64,
    /// End of the current window (Unix ms)
    pub reset_at_ms: i64,
}

impl WindowRecord {
    fn fresh(now_ms: i64, policy: &RateLimitPolicy) -> Self {
        Self {
            count: 1,
            reset_at_ms: now_ms + policy.window_ms(),
        }
    }

    /// The window is over only once `now` is strictly past the reset time
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.reset_at_ms
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request is allowed
    pub allowed: bool,
    /// The rate limit (max requests)
    pub limit: u64,
    /// Number of requests remaining in the current window
    pub remaining: u64,
    /// Unix ms when the window resets
    pub reset_at_ms: i64,
    /// Requests counted in the current window
    pub count: u64,
}

impl RateLimitDecision {
    /// Apply the fixed-window rule to the stored record, if any
    pub fn evaluate(
        record: Option<WindowRecord>,
        policy: &RateLimitPolicy,
        now_ms: i64,
    ) -> (WindowRecord, RateLimitDecision) {
        let limit = policy.max_requests;
        match record {
            Some(mut record) if !record.is_expired(now_ms) => {
                if record.count < limit {
                    record.count += 1;
                    (record, Self::allowed(limit, record))
                } else {
                    let decision = RateLimitDecision {
                        allowed: false,
                        limit,
                        remaining: 0,
                        reset_at_ms: record.reset_at_ms,
                        count: record.count,
                    };
                    (record, decision)
                }
            }
            _ => {
                let record = WindowRecord::fresh(now_ms, policy);
                (record, Self::allowed(limit, record))
            }
        }
    }

    /// Budget standing for a key without counting a request
    pub fn standing(record: Option<WindowRecord>, policy: &RateLimitPolicy, now_ms: i64) -> Self {
        let limit = policy.max_requests;
        match record {
            Some(record) if !record.is_expired(now_ms) => {
                let remaining = limit.saturating_sub(record.count);
                Self {
                    allowed: remaining > 0,
                    limit,
                    remaining,
                    reset_at_ms: record.reset_at_ms,
                    count: record.count,
                }
            }
            _ => Self {
                allowed: true,
                limit,
                remaining: limit,
                reset_at_ms: now_ms + policy.window_ms(),
                count: 0,
            },
        }
    }

    fn allowed(limit: u64, record: WindowRecord) -> Self {
        Self {
            allowed: true,
            limit,
            remaining: limit.saturating_sub(record.count),
            reset_at_ms: record.reset_at_ms,
            count: record.count,
        }
    }

    /// Whole seconds until the window resets, at least one
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        ceil_secs(self.reset_at_ms - now_ms).max(1)
    }
}

/// Storage for fixed-window counters
///
/// `hit` performs the whole check-and-increment atomically per key.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn hit(&self, key: &str, policy: &RateLimitPolicy, now_ms: i64)
        -> Result<RateLimitDecision>;

    async fn get(&self, key: &str) -> Result<Option<WindowRecord>>;

    async fn reset(&self, key: &str) -> Result<()>;

    /// Remove records whose window is over; returns how many were removed
    async fn evict_expired(&self, now_ms: i64) -> Result<usize>;
}

/// Single-process counter store
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    records: DashMap<String, WindowRecord>,
}

impl InMemoryRateLimitStore {
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
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        policy: &RateLimitPolicy,
        now_ms: i64,
    ) -> Result<RateLimitDecision> {
        // Holding the entry keeps the shard locked across read, compare and write
        let decision = match self.records.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let (record, decision) =
                    RateLimitDecision::evaluate(Some(*occupied.get()), policy, now_ms);
                occupied.insert(record);
                decision
            }
            Entry::Vacant(vacant) => {
                let (record, decision) = RateLimitDecision::evaluate(None, policy, now_ms);
                vacant.insert(record);
                decision
            }
        };
        Ok(decision)
    }

    async fn get(&self, key: &str) -> Result<Option<WindowRecord>> {
        Ok(self.records.get(key).map(|r| *r))
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.records.remove(key);
        tracing::info!(key = %key, "Rate limit reset");
        Ok(())
    }

    async fn evict_expired(&self, now_ms: i64) -> Result<usize> {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now_ms));
        Ok(before.saturating_sub(self.records.len()))
    }
}
