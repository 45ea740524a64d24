//! Message library: the append/query surface used by the rest of the app.
//!
//! Every operation reads the full collection, changes it in memory and writes
//! it back in full. Storage and mirror failures are absorbed here; the only
//! error a caller can see is an invalid `NewMessage`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::DEFAULT_MAX_RECORDS;
use crate::models::{MessageRecord, NewMessage, ParticipantRole, Rejection};
use crate::storage::{KeyValueStore, LocalStore};
use crate::sync::{RemoteSync, RecordSink, DEFAULT_TABLE};

/// How long `shutdown` waits for queued mirror writes.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Handle owning the local history and the mirror worker.
pub struct MessageLibrary {
    store: LocalStore,
    remote: RemoteSync,
    max_records: Option<usize>,
    write_lock: Mutex<()>,
}

impl MessageLibrary {
    /// Build a library over `storage`, mirroring to `remote` when given.
    pub fn init(storage: Arc<dyn KeyValueStore>, remote: Option<Arc<dyn RecordSink>>) -> Self {
        let remote = match remote {
            Some(sink) => RemoteSync::start(sink, DEFAULT_TABLE),
            None => RemoteSync::disabled(),
        };
        Self::with_sync(storage, remote)
    }

    /// Build a library with an already configured sync handle.
    ///
    /// History is capped at `DEFAULT_MAX_RECORDS` until `with_max_records`
    /// says otherwise.
    pub fn with_sync(storage: Arc<dyn KeyValueStore>, remote: RemoteSync) -> Self {
        Self {
            store: LocalStore::new(storage),
            remote,
            max_records: Some(DEFAULT_MAX_RECORDS),
            write_lock: Mutex::new(()),
        }
    }

    /// Cap the local history; the oldest messages are evicted first.
    /// `None` or `Some(0)` removes the cap.
    pub fn with_max_records(mut self, max_records: Option<usize>) -> Self {
        self.max_records = max_records.filter(|n| *n > 0);
        self
    }

    pub fn is_syncing(&self) -> bool {
        self.remote.is_enabled()
    }

    /// Append a message and queue it for mirroring.
    ///
    /// Returns as soon as the local write has been attempted. The mirror
    /// write happens later, if at all.
    pub fn append(&self, input: NewMessage) -> Result<MessageRecord, Rejection> {
        let record = input.into_record()?;

        {
            let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
            let mut records = self.store.load();
            records.push(record.clone());

            if let Some(max) = self.max_records {
                if records.len() > max {
                    let evicted = records.len() - max;
                    records.drain(..evicted);
                    tracing::debug!("Evicted {} old message(s) from history", evicted);
                }
            }

            self.store.save(&records);
        }

        self.remote.sync(&record);
        Ok(record)
    }

    /// Remove every message for `name` (and `role`, if given).
    ///
    /// Returns the number of removed messages.
    pub fn remove_for_participant(&self, name: &str, role: Option<ParticipantRole>) -> usize {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = self.store.load();
        let before = records.len();
        records.retain(|r| !r.matches(name, role));

        let removed = before - records.len();
        if removed > 0 {
            self.store.save(&records);
            tracing::debug!("Removed {} message(s) for {}", removed, name);
        }
        removed
    }

    /// Full history in insertion order.
    pub fn messages(&self) -> Vec<MessageRecord> {
        self.store.load()
    }

    /// History with one participant, in insertion order.
    pub fn messages_for_participant(
        &self,
        name: &str,
        role: Option<ParticipantRole>,
    ) -> Vec<MessageRecord> {
        self.store
            .load()
            .into_iter()
            .filter(|r| r.matches(name, role))
            .collect()
    }

    /// Distinct (name, role) pairs in order of first appearance.
    pub fn participants(&self) -> Vec<(String, ParticipantRole)> {
        self.participant_counts()
            .into_iter()
            .map(|(name, role, _)| (name, role))
            .collect()
    }

    /// Distinct (name, role) pairs with their message counts, in order of
    /// first appearance.
    pub fn participant_counts(&self) -> Vec<(String, ParticipantRole, usize)> {
        let mut counts: Vec<(String, ParticipantRole, usize)> = Vec::new();
        let mut index: HashMap<(String, ParticipantRole), usize> = HashMap::new();
        for record in self.store.load() {
            let key = (record.participant_name, record.participant_role);
            match index.get(&key) {
                Some(&i) => counts[i].2 += 1,
                None => {
                    index.insert(key.clone(), counts.len());
                    counts.push((key.0, key.1, 1));
                }
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.store.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Give queued mirror writes a bounded chance to finish.
    pub async fn shutdown(self) {
        self.remote.shutdown(SHUTDOWN_GRACE).await;
    }
}
