use crate::audit::entry::AuditLogEntry;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Trait for audit sinks
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Write a batch of audit entries
    async fn write_batch(&self, entries: Vec<AuditLogEntry>) -> Result<()>;
}

/// Emits each entry as a structured event on the `audit` tracing target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditStorage;

#[async_trait]
impl AuditStorage for TracingAuditStorage {
    async fn write_batch(&self, entries: Vec<AuditLogEntry>) -> Result<()> {
        for entry in entries {
            let rendered = serde_json::to_string(&entry)
                .map_err(|e| AppError::Internal(format!("Failed to serialize audit entry: {}", e)))?;
            tracing::info!(
                target: "audit",
                action = entry.action(),
                status = entry.status().as_str(),
                ip = entry.ip_address(),
                user_id = entry.user_id().unwrap_or("-"),
                entry = %rendered,
                "audit"
            );
        }
        Ok(())
    }
}

/// Keeps entries in memory; for tests and local inspection
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditStorage {
    entries: Arc<Mutex<Vec<AuditLogEntry>>>,
}

impl MemoryAuditStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditStorage for MemoryAuditStorage {
    async fn write_batch(&self, entries: Vec<AuditLogEntry>) -> Result<()> {
        self.entries.lock().await.extend(entries);
        Ok(())
    }
}
