pub mod entry;
pub mod logger;
pub mod recorder;
pub mod storage;

pub use entry::{actions, AuditLogEntry, AuditOptions, AuditStatus};
pub use logger::{AuditLogger, AuditLoggerConfig};
pub use recorder::AuditRecorder;
pub use storage::{AuditStorage, MemoryAuditStorage, TracingAuditStorage};
