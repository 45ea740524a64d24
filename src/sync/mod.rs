//! Best-effort mirroring of new messages to the external record store.
//!
//! `RemoteSync::sync` only pushes onto an unbounded channel. A background
//! tokio task drains the channel and inserts one row per message. Delivery is
//! at-most-once: failures are logged and the message is not retried. Callers
//! never see the outcome.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::MessageRecord;

/// Default table name in the record store.
pub const DEFAULT_TABLE: &str = "message_library";

/// Destination that accepts one row at a time.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn insert(&self, table: &str, row: serde_json::Value) -> Result<()>;
}

/// Row shape written to the record store.
#[derive(Debug, Serialize)]
struct RemoteRow<'a> {
    id: &'a str,
    created_at: &'a str,
    participant_name: &'a str,
    participant_role: &'a str,
    content: &'a str,
    direction: &'a str,
    source: &'a str,
}

/// Convert a record to the record store's snake_case row.
pub fn remote_row(record: &MessageRecord) -> serde_json::Value {
    let row = RemoteRow {
        id: &record.id,
        created_at: &record.created_at,
        participant_name: &record.participant_name,
        participant_role: record.participant_role.as_str(),
        content: &record.content,
        direction: record.direction.as_str(),
        source: record.source.as_str(),
    };
    serde_json::to_value(row).unwrap_or_default()
}

/// Handle for submitting records to the background sync worker.
pub struct RemoteSync {
    tx: Option<mpsc::UnboundedSender<MessageRecord>>,
    worker: Option<JoinHandle<()>>,
}

impl RemoteSync {
    /// Sync that drops everything. Used when no record store is configured.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            worker: None,
        }
    }

    /// Spawn the worker on the current tokio runtime.
    ///
    /// Outside a runtime there is nowhere to run the worker, so sync is
    /// disabled instead.
    pub fn start(sink: Arc<dyn RecordSink>, table: impl Into<String>) -> Self {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("No async runtime available, remote message sync disabled");
                return Self::disabled();
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = handle.spawn(sync_loop(rx, sink, table.into()));

        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue a record for mirroring (non-blocking, never fails).
    pub fn sync(&self, record: &MessageRecord) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(record.clone()).is_err() {
            tracing::error!("Sync worker stopped -- message {} not mirrored", record.id);
        }
    }

    /// Stop accepting records and give queued ones up to `timeout` to go out.
    pub async fn shutdown(mut self, timeout: Duration) {
        self.tx = None;
        if let Some(worker) = self.worker.take() {
            if tokio::time::timeout(timeout, worker).await.is_err() {
                tracing::warn!(
                    "Remote message sync still busy after {:?}, abandoning queued messages",
                    timeout
                );
            }
        }
    }
}

/// Background loop that inserts queued records one by one.
///
/// Each insert runs in its own task so a panicking sink only loses that one
/// record; awaiting it before the next keeps rows in submission order.
async fn sync_loop(
    mut rx: mpsc::UnboundedReceiver<MessageRecord>,
    sink: Arc<dyn RecordSink>,
    table: String,
) {
    while let Some(record) = rx.recv().await {
        let row = remote_row(&record);
        let sink = Arc::clone(&sink);
        let insert_table = table.clone();
        let insert = tokio::spawn(async move { sink.insert(&insert_table, row).await });

        match insert.await {
            Ok(Ok(())) => tracing::debug!("Mirrored message {} to {}", record.id, table),
            Ok(Err(e)) => {
                tracing::error!("Failed to sync message {} to record store: {:#}", record.id, e)
            }
            Err(e) => {
                tracing::error!("Sync of message {} aborted: {}", record.id, e)
            }
        }
    }
}
