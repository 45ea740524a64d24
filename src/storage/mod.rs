//! Local persistence for the message history
//!
//! The whole collection lives under a single key as a JSON array. Reads and
//! writes never fail from the caller's point of view: unavailable storage
//! reads as an empty history and failed writes are logged and dropped.

mod kv;

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

pub use kv::{FileStore, KeyValueStore, MemoryStore};

use crate::models::{validate, MessageRecord};

/// Storage key for the message collection.
pub const STORAGE_KEY: &str = "creatoros_message_library_v1";

/// Ordered message collection on top of a key-value backend.
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn KeyValueStore>,
}

impl LocalStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Load every valid record in insertion order.
    pub fn load(&self) -> Vec<MessageRecord> {
        let raw = match self.backend.get(STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("Message storage unavailable: {:#}", e);
                return Vec::new();
            }
        };

        let entries = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) => {
                tracing::warn!("Stored message history is not a list, ignoring it");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("Stored message history is not valid JSON: {}", e);
                return Vec::new();
            }
        };

        let mut records: Vec<MessageRecord> = Vec::with_capacity(entries.len());
        let mut seen_ids: HashSet<String> = HashSet::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            match validate(entry) {
                Ok(record) => {
                    if !seen_ids.insert(record.id.clone()) {
                        tracing::debug!("Dropping message #{}: duplicate id {}", index, record.id);
                        continue;
                    }
                    records.push(record);
                }
                Err(reason) => {
                    tracing::debug!("Dropping message #{}: {}", index, reason);
                }
            }
        }
        records
    }

    /// Overwrite the stored collection. Best effort: errors are logged only.
    pub fn save(&self, records: &[MessageRecord]) {
        let payload = match serde_json::to_string(records) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to serialize message history: {}", e);
                return;
            }
        };

        if let Err(e) = self.backend.set(STORAGE_KEY, &payload) {
            tracing::warn!("Failed to persist message history: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMessage;
    use anyhow::{bail, Result};

    /// Backend that behaves like disabled browser storage.
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            bail!("storage disabled")
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            bail!("quota exceeded")
        }
    }

    fn store_with(raw: &str) -> LocalStore {
        let backend = MemoryStore::new();
        backend.set(STORAGE_KEY, raw).unwrap();
        LocalStore::new(Arc::new(backend))
    }

    #[test]
    fn test_load_empty_when_absent() {
        let store = LocalStore::new(Arc::new(MemoryStore::new()));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_tolerates_corrupt_payloads() {
        assert!(store_with("not json at all").load().is_empty());
        assert!(store_with("{\"participantName\":\"Alice\"}").load().is_empty());
        assert!(store_with("42").load().is_empty());
        assert!(store_with("").load().is_empty());
    }

    #[test]
    fn test_load_drops_bad_entries_individually() {
        let store = store_with(
            r#"[
                {"id":"1","participantName":"Alice","content":"hi"},
                null,
                {"id":"2","participantName":"","content":"empty name"},
                {"id":"3","participantName":"Bob","content":""},
                "junk",
                {"id":"4","participantName":"Bob","content":"hello","participantRole":"sponsor"}
            ]"#,
        );

        let records = store.load();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[test]
    fn test_load_collapses_duplicate_ids() {
        let store = store_with(
            r#"[
                {"id":"1","participantName":"Alice","content":"first"},
                {"id":"1","participantName":"Alice","content":"second"}
            ]"#,
        );

        let records = store.load();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "first");
    }

    #[test]
    fn test_save_then_load_preserves_order() {
        let store = LocalStore::new(Arc::new(MemoryStore::new()));
        let records: Vec<MessageRecord> = ["one", "two", "three"]
            .iter()
            .map(|c| NewMessage::new("Alice", *c).into_record().unwrap())
            .collect();

        store.save(&records);
        assert_eq!(store.load(), records);
    }

    #[test]
    fn test_broken_backend_is_swallowed() {
        let store = LocalStore::new(Arc::new(BrokenStore));
        let record = NewMessage::new("Alice", "hi").into_record().unwrap();

        store.save(&[record]);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_large_history() {
        let records: Vec<MessageRecord> = (0..20_000)
            .map(|i| NewMessage::new("Alice", format!("message {}", i)).into_record().unwrap())
            .collect();
        let store = LocalStore::new(Arc::new(MemoryStore::new()));
        store.save(&records);

        let started = std::time::Instant::now();
        let loaded = store.load();
        assert_eq!(loaded.len(), 20_000);
        assert_eq!(loaded[19_999].content, "message 19999");
        assert!(
            started.elapsed() < std::time::Duration::from_secs(5),
            "load took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn test_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let record = NewMessage::new("Alice", "persisted").into_record().unwrap();

        LocalStore::new(Arc::new(FileStore::new(dir.path()))).save(&[record.clone()]);

        let reopened = LocalStore::new(Arc::new(FileStore::new(dir.path())));
        assert_eq!(reopened.load(), vec![record]);
    }
}
