use redis::aio::ConnectionManager;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthChecks {
    pub redis: ComponentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    fn new(status: &str, message: Option<String>) -> Self {
        Self {
            status: status.to_string(),
            message,
        }
    }
}

/// Liveness and readiness probes
///
/// Redis is only checked when a shared store is in use; the in-memory
/// deployment has no external dependency to probe.
#[derive(Clone, Default)]
pub struct HealthChecker {
    redis_manager: Option<ConnectionManager>,
}

impl HealthChecker {
    pub fn new(redis_manager: Option<ConnectionManager>) -> Self {
        Self { redis_manager }
    }

    /// Liveness check - is the service running?
    pub async fn liveness(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks: HealthChecks {
                redis: ComponentStatus::new("unknown", None),
            },
        }
    }

    /// Readiness check - can the service handle requests?
    pub async fn readiness(&self) -> HealthStatus {
        let redis_status = self.check_redis().await;

        let overall_status = if redis_status.status == "error" {
            "degraded"
        } else {
            "ok"
        };

        HealthStatus {
            status: overall_status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks: HealthChecks {
                redis: redis_status,
            },
        }
    }

    async fn check_redis(&self) -> ComponentStatus {
        let Some(manager) = &self.redis_manager else {
            return ComponentStatus::new("not_configured", None);
        };

        match crate::redis::health_check(manager).await {
            Ok(()) => ComponentStatus::new("ok", None),
            Err(e) => {
                tracing::warn!(error = %e, "Redis health check failed");
                ComponentStatus::new("error", Some("Redis check failed".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness_is_always_ok() {
        let status = HealthChecker::default().liveness().await;
        assert!(status.is_ok());
        assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_ready_without_redis() {
        let status = HealthChecker::new(None).readiness().await;
        assert!(status.is_ok());
        assert_eq!(status.checks.redis.status, "not_configured");
    }
}
