use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Action names used across the service
pub mod actions {
    pub const LOGIN: &str = "user.login";
    pub const LOGIN_FAILED: &str = "user.login.failed";
    pub const LOGIN_LOCKED: &str = "user.login.locked";
    pub const LOGIN_ERROR: &str = "user.login.error";
    pub const LOGOUT: &str = "user.logout";
    pub const REGISTER: &str = "user.register";
    pub const REGISTER_REJECTED: &str = "user.register.rejected";
    pub const REGISTER_ERROR: &str = "user.register.error";
}

/// Outcome of an audited action
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failure,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Failure => "failure",
        }
    }
}

/// Optional parts of an entry
#[derive(Debug, Clone)]
pub struct AuditOptions {
    pub user_id: Option<String>,
    pub status: AuditStatus,
    pub details: Map<String, Value>,
}

impl AuditOptions {
    pub fn new(status: AuditStatus) -> Self {
        Self {
            user_id: None,
            status,
            details: Map::new(),
        }
    }

    pub fn success() -> Self {
        Self::new(AuditStatus::Success)
    }

    pub fn failure() -> Self {
        Self::new(AuditStatus::Failure)
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Immutable record of a security-relevant action
///
/// Fields are private and there are no setters: once built, an entry is only
/// read and serialized.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    id: Uuid,
    timestamp: DateTime<Utc>,
    action: String,
    ip_address: String,
    user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    status: AuditStatus,
    #[serde(skip_serializing_if = "Map::is_empty")]
    details: Map<String, Value>,
}

impl AuditLogEntry {
    pub(crate) fn new(
        timestamp: DateTime<Utc>,
        action: &str,
        ip_address: &str,
        user_agent: &str,
        options: AuditOptions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            action: action.to_string(),
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
            user_id: options.user_id,
            status: options.status,
            details: options.details,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn ip_address(&self) -> &str {
        &self.ip_address
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn status(&self) -> AuditStatus {
        self.status
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }
}
