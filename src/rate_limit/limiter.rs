use crate::clock::SharedClock;
use crate::config::{RateLimitConfig, RateLimitPolicy};
use crate::errors::Result;
use crate::rate_limit::fixed_window::{
    InMemoryRateLimitStore, RateLimitDecision, RateLimitStore, WindowRecord,
};
use std::fmt;
use std::sync::Arc;

/// Budget category of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// `/api/auth/*`: small budget over a long window
    Auth,
    /// Scan triggers
    Scan,
    General,
    /// Account creation, checked by the registration handler
    Registration,
}

impl RouteClass {
    /// Classify a request path for the gatekeeper
    pub fn classify(path: &str) -> Self {
        if path.starts_with("/api/auth/") {
            RouteClass::Auth
        } else if path.starts_with("/api/scans") || path.contains("/scan") {
            RouteClass::Scan
        } else {
            RouteClass::General
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Auth => "auth",
            RouteClass::Scan => "scan",
            RouteClass::General => "general",
            RouteClass::Registration => "registration",
        }
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-window rate limiter keyed by (route class, client identifier)
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitConfig, clock: SharedClock) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    pub fn in_memory(config: RateLimitConfig, clock: SharedClock) -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()), config, clock)
    }

    pub fn policy(&self, class: RouteClass) -> RateLimitPolicy {
        match class {
            RouteClass::Auth => self.config.auth,
            RouteClass::Scan => self.config.scan,
            RouteClass::General => self.config.general,
            RouteClass::Registration => self.config.registration,
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    fn key(identifier: &str, class: RouteClass) -> String {
        format!("{}:{}", class.as_str(), identifier)
    }

    /// Count one request against the class budget
    pub async fn check_and_consume(
        &self,
        identifier: &str,
        class: RouteClass,
    ) -> Result<RateLimitDecision> {
        let policy = self.policy(class);
        let decision = self
            .store
            .hit(&Self::key(identifier, class), &policy, self.clock.now_ms())
            .await?;

        if !decision.allowed {
            tracing::warn!(
                identifier = %identifier,
                route_class = %class,
                limit = %decision.limit,
                reset_at_ms = %decision.reset_at_ms,
                "Rate limit exceeded"
            );
        }

        Ok(decision)
    }

    /// Budget standing for the key without counting a request
    pub async fn standing(&self, identifier: &str, class: RouteClass) -> Result<RateLimitDecision> {
        let record = self.peek(identifier, class).await?;
        Ok(RateLimitDecision::standing(
            record,
            &self.policy(class),
            self.clock.now_ms(),
        ))
    }

    /// Current record without counting a request
    pub async fn peek(&self, identifier: &str, class: RouteClass) -> Result<Option<WindowRecord>> {
        self.store.get(&Self::key(identifier, class)).await
    }

    /// Reset rate limit for a specific identifier
    pub async fn reset(&self, identifier: &str, class: RouteClass) -> Result<()> {
        self.store.reset(&Self::key(identifier, class)).await
    }

    pub async fn evict_expired(&self) -> Result<usize> {
        self.store.evict_expired(self.clock.now_ms()).await
    }
}
