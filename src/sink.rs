//! Persistence seam behind the log sink servers.
//!
//! The sink's gRPC and TCP RPC servers both write through the [`LogStore`]
//! trait; the real database lives outside this crate. [`MemoryStore`] is
//! the in-process implementation used by the sink binary and the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use thiserror::Error;

/// A stored log entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub name: String,
    pub data: String,
    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            created_at: Utc::now(),
        }
    }
}

/// Errors surfaced by a log store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Where the sink writes entries.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn insert(&self, entry: LogEntry) -> Result<(), StoreError>;
}

/// In-memory store backing the sink binary and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().expect("store lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn insert(&self, entry: LogEntry) -> Result<(), StoreError> {
        self.entries.lock().expect("store lock poisoned").push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_snapshot() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store
            .insert(LogEntry::new("event", "user 42 signed in"))
            .await
            .unwrap();
        store.insert(LogEntry::new("audit", "role changed")).await.unwrap();

        let entries = store.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "event");
        assert_eq!(entries[1].data, "role changed");
        assert!(entries[0].created_at <= entries[1].created_at);
    }
}
