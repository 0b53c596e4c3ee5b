//! # Audit Dispatch
//!
//! Activity logging that can never fail or slow down the operation being
//! logged. Callers hand an [`AuditEntry`] to an [`AuditSink`]; the
//! production sink pushes it onto a bounded queue drained by one background
//! task.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Audit Pipeline                                   │
//! │                                                                         │
//! │  SaleEngine ──┐                                                         │
//! │               ├── record() ── try_send ──► mpsc (bounded) ──► worker   │
//! │  Inventory ───┘        │                                        │       │
//! │                        └─ full / closed: warn!, drop            │       │
//! │                                                                 ▼       │
//! │                                              activity_logs INSERT      │
//! │                                              (failure: error!, drop)   │
//! │                                                                         │
//! │  AuditWorkerHandle::shutdown()                                          │
//! │     1. close the queue (new entries are dropped)                        │
//! │     2. drain what is already queued                                     │
//! │     3. join the worker task                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use stockroom_core::ActivityLog;
use stockroom_db::repository::generate_id;
use stockroom_db::{ActivityLogRepository, Database};

// =============================================================================
// Actions
// =============================================================================

pub const SALE_CREATED: &str = "SALE_CREATED";
pub const STOCK_RECEIVED: &str = "STOCK_RECEIVED";

// =============================================================================
// Entry and Sink
// =============================================================================

/// One activity log entry before it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_id: Option<String>,
    pub action: String,
    pub description: String,
    /// Stored as JSON text; `Value::Null` is stored as NULL.
    pub metadata: Value,
}

impl AuditEntry {
    pub fn new(user_id: &str, action: &str, description: impl Into<String>, metadata: Value) -> Self {
        AuditEntry {
            user_id: Some(user_id.to_string()),
            action: action.to_string(),
            description: description.into(),
            metadata,
        }
    }

    fn into_log(self) -> ActivityLog {
        let metadata = match self.metadata {
            Value::Null => None,
            value => Some(value.to_string()),
        };

        ActivityLog {
            id: generate_id(),
            user_id: self.user_id,
            action: self.action,
            description: self.description,
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// Destination for audit entries.
///
/// `record` must not block and must not fail; losing an entry is reported
/// through `tracing` only.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

// =============================================================================
// Queue-backed Sink
// =============================================================================

/// Sink that enqueues entries for the background worker.
#[derive(Debug, Clone)]
pub struct AuditDispatcher {
    tx: mpsc::Sender<AuditEntry>,
}

/// Handle for stopping the audit worker.
pub struct AuditWorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl AuditDispatcher {
    /// Starts the worker on the current runtime.
    ///
    /// ## Panics
    /// If `capacity` is zero (see `ServiceConfig`, which rejects it).
    pub fn spawn(db: &Database, capacity: usize) -> (AuditDispatcher, AuditWorkerHandle) {
        let (tx, rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let worker = AuditWorker {
            logs: db.activity_logs(),
            rx,
            shutdown_rx,
        };
        let task = tokio::spawn(worker.run());

        (
            AuditDispatcher { tx },
            AuditWorkerHandle { shutdown_tx, task },
        )
    }
}

impl AuditSink for AuditDispatcher {
    fn record(&self, entry: AuditEntry) {
        match self.tx.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                warn!(action = %entry.action, user_id = ?entry.user_id, "Audit queue full, entry dropped");
            }
            Err(TrySendError::Closed(entry)) => {
                warn!(action = %entry.action, user_id = ?entry.user_id, "Audit worker stopped, entry dropped");
            }
        }
    }
}

impl AuditWorkerHandle {
    /// Writes everything already queued, then stops the worker.
    pub async fn shutdown(self) {
        // The worker may already be gone if every dispatcher was dropped.
        let _ = self.shutdown_tx.send(()).await;

        if let Err(e) = self.task.await {
            error!(?e, "Audit worker terminated abnormally");
        }
    }
}

// =============================================================================
// Worker
// =============================================================================

struct AuditWorker {
    logs: ActivityLogRepository,
    rx: mpsc::Receiver<AuditEntry>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl AuditWorker {
    async fn run(mut self) {
        debug!("Audit worker starting");

        loop {
            tokio::select! {
                entry = self.rx.recv() => match entry {
                    Some(entry) => self.write(entry).await,
                    // Every dispatcher dropped
                    None => break,
                },

                _ = self.shutdown_rx.recv() => {
                    self.rx.close();
                    let mut drained = 0usize;
                    while let Some(entry) = self.rx.recv().await {
                        self.write(entry).await;
                        drained += 1;
                    }
                    info!(drained, "Audit queue drained");
                    break;
                }
            }
        }

        debug!("Audit worker stopped");
    }

    async fn write(&self, entry: AuditEntry) {
        let action = entry.action.clone();
        if let Err(e) = self.logs.insert(&entry.into_log()).await {
            error!(%action, error = %e, "Failed to write activity log, entry discarded");
        }
    }
}
