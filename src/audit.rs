//! Audit Log
//!
//! Fire-and-forget journal of protective actions. Events are pushed onto a
//! bounded channel and written as JSON lines by a dedicated task; a full
//! queue drops the event rather than ever blocking a monitoring loop.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    PositionOpened {
        ticket: u64,
        symbol: String,
        direction: String,
        volume: f64,
        sl: Option<f64>,
        tp: Option<f64>,
        confidence: f64,
    },
    BreakevenSet {
        ticket: u64,
        symbol: String,
        new_sl: f64,
        profit: f64,
    },
    LadderAdvance {
        ticket: u64,
        symbol: String,
        level: f64,
        new_sl: f64,
    },
    TrailingUpdate {
        ticket: u64,
        symbol: String,
        new_sl: f64,
    },
    ReversalClose {
        ticket: u64,
        symbol: String,
        confidence: f64,
    },
    TickError {
        symbol: String,
        detail: String,
    },
}

#[derive(Debug, Serialize)]
struct AuditRecord {
    ts: DateTime<Utc>,
    #[serde(flatten)]
    event: AuditEvent,
}

/// Cheap cloneable handle used by every component that emits events
#[derive(Clone)]
pub struct AuditHandle {
    tx: Option<mpsc::Sender<AuditEvent>>,
}

impl AuditHandle {
    /// Handle that swallows every event, for tests and dry wiring
    pub fn disabled() -> AuditHandle {
        AuditHandle { tx: None }
    }

    pub fn record(&self, event: AuditEvent) {
        let Some(tx) = &self.tx else { return };
        if let Err(e) = tx.try_send(event) {
            debug!("audit queue full, event dropped: {}", e);
        }
    }
}

pub struct AuditLog;

impl AuditLog {
    /// Spawn the writer task appending JSON lines to `path`.
    ///
    /// # Returns
    /// Handle to record events through
    pub fn spawn(path: PathBuf) -> AuditHandle {
        let (tx, mut rx) = mpsc::channel::<AuditEvent>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await;

            let mut file = match file {
                Ok(file) => file,
                Err(e) => {
                    error!("audit log unavailable at {}: {}", path.display(), e);
                    // Keep draining so senders never observe a closed channel
                    while rx.recv().await.is_some() {}
                    return;
                }
            };

            while let Some(event) = rx.recv().await {
                let record = AuditRecord {
                    ts: Utc::now(),
                    event,
                };
                match serde_json::to_string(&record) {
                    Ok(mut line) => {
                        line.push('\n');
                        if let Err(e) = file.write_all(line.as_bytes()).await {
                            warn!("audit write failed: {}", e);
                        }
                    }
                    Err(e) => warn!("audit serialization failed: {}", e),
                }
            }
        });

        AuditHandle { tx: Some(tx) }
    }
}
