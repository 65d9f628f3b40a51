use crate::audit::entry::{AuditLogEntry, AuditOptions};
use crate::clock::SharedClock;
use chrono::{DateTime, Utc};

/// Builds audit entries stamped with the injected clock
///
/// Construction only; emitting the entry is the caller's job (see `AuditLogger`).
#[derive(Clone)]
pub struct AuditRecorder {
    clock: SharedClock,
}

impl AuditRecorder {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    pub fn record(
        &self,
        action: &str,
        actor_ip: &str,
        user_agent: &str,
        options: AuditOptions,
    ) -> AuditLogEntry {
        let timestamp =
            DateTime::<Utc>::from_timestamp_millis(self.clock.now_ms()).unwrap_or_else(Utc::now);
        AuditLogEntry::new(timestamp, action, actor_ip, user_agent, options)
    }
}
