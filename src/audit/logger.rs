use crate::audit::entry::AuditLogEntry;
use crate::audit::storage::AuditStorage;
use crate::config::AuditConfig;
use crate::errors::Result;
use crate::observability::MetricsRecorder;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval_at, Duration, Instant};
use tracing::{error, info, warn};

/// Configuration for the audit logger
#[derive(Debug, Clone)]
pub struct AuditLoggerConfig {
    pub batch_size: usize,
    pub batch_timeout_ms: u64,
    pub channel_buffer_size: usize,
}

impl Default for AuditLoggerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_timeout_ms: 1000,
            channel_buffer_size: 10000,
        }
    }
}

impl From<&AuditConfig> for AuditLoggerConfig {
    fn from(config: &AuditConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            batch_timeout_ms: config.flush_interval_ms.max(1),
            channel_buffer_size: config.channel_capacity.max(1),
        }
    }
}

/// Fire-and-forget audit emitter with background batching
///
/// `emit` never waits: a full queue drops the entry and counts it, so a slow
/// sink cannot hold up the request being audited.
#[derive(Clone)]
pub struct AuditLogger {
    sender: Option<mpsc::Sender<AuditLogEntry>>,
}

impl AuditLogger {
    /// Create a new audit logger with the given storage backend and configuration
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(storage: Arc<dyn AuditStorage>, config: AuditLoggerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.channel_buffer_size);

        // Spawn the background batch processor
        tokio::spawn(batch_processor(receiver, storage, config));

        Self {
            sender: Some(sender),
        }
    }

    /// Logger that discards everything
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn from_config(storage: Arc<dyn AuditStorage>, config: &AuditConfig) -> Self {
        if config.enabled {
            Self::new(storage, AuditLoggerConfig::from(config))
        } else {
            info!("Audit logging disabled");
            Self::disabled()
        }
    }

    /// Queue an entry without waiting
    pub fn emit(&self, entry: AuditLogEntry) {
        let Some(sender) = &self.sender else {
            return;
        };

        MetricsRecorder::record_audit_event(entry.status().as_str());

        match sender.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                MetricsRecorder::record_audit_dropped(1);
                warn!(action = entry.action(), "Audit queue full, entry dropped");
            }
            Err(TrySendError::Closed(entry)) => {
                MetricsRecorder::record_audit_dropped(1);
                error!(action = entry.action(), "Audit processor stopped, entry dropped");
            }
        }
    }

    /// Entries waiting in the queue (for monitoring)
    pub fn queue_size(&self) -> usize {
        self.sender
            .as_ref()
            .map(|s| s.max_capacity() - s.capacity())
            .unwrap_or(0)
    }
}

/// Background batch processor that accumulates entries and writes them in batches
async fn batch_processor(
    mut receiver: mpsc::Receiver<AuditLogEntry>,
    storage: Arc<dyn AuditStorage>,
    config: AuditLoggerConfig,
) {
    let mut batch: Vec<AuditLogEntry> = Vec::with_capacity(config.batch_size);
    // First tick one period out, not immediately
    let period = Duration::from_millis(config.batch_timeout_ms);
    let mut flush_interval = interval_at(Instant::now() + period, period);

    info!(
        "Audit logger batch processor started (batch_size={}, timeout_ms={})",
        config.batch_size, config.batch_timeout_ms
    );

    loop {
        tokio::select! {
            // Receive entries from the channel
            Some(entry) = receiver.recv() => {
                batch.push(entry);

                // Flush if batch is full
                if batch.len() >= config.batch_size {
                    flush_batch(&mut batch, &storage).await;
                }
            }

            // Flush on timeout even if batch is not full
            _ = flush_interval.tick() => {
                if !batch.is_empty() {
                    flush_batch(&mut batch, &storage).await;
                }
            }

            // Channel closed, flush remaining entries and exit
            else => {
                warn!("Audit logger channel closed, flushing remaining entries");
                if !batch.is_empty() {
                    flush_batch(&mut batch, &storage).await;
                }
                break;
            }
        }
    }

    info!("Audit logger batch processor stopped");
}

/// Flush a batch to storage; a failed write drops the batch
async fn flush_batch(batch: &mut Vec<AuditLogEntry>, storage: &Arc<dyn AuditStorage>) {
    let count = batch.len();
    let start = Instant::now();

    let result: Result<()> = storage.write_batch(std::mem::take(batch)).await;
    match result {
        Ok(()) => {
            tracing::debug!("Flushed {} audit entries in {:?}", count, start.elapsed());
        }
        Err(e) => {
            MetricsRecorder::record_audit_dropped(count as u64);
            error!("Failed to flush audit batch of {}: {:?}", count, e);
        }
    }
}
