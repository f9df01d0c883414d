//! Persistence for locator records, the user-facing log, and the change log.

mod json_file;
mod memory;

pub use json_file::{JsonFileStore, SCHEMA_VERSION};
pub use memory::MemoryStore;

use pathmark_common::record::{LocatorRecord, ResolutionResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Store file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Store schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("Store lock poisoned")]
    Poisoned,
}

/// One line of user-facing history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub time: u64,
    pub message: String,
}

/// What a relay did to a record, kept for drift and value history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub id: u64,
    pub record_id: String,
    pub time: u64,
    #[serde(default)]
    pub results: Vec<ResolutionResult>,
    #[serde(default)]
    pub value: String,
}

/// Key-value store of records keyed by `LocatorRecord::id`.
pub trait RecordStore {
    fn get(&self, id: &str) -> Result<Option<LocatorRecord>, StoreError>;
    /// Inserts or replaces the record with the same id.
    fn put(&self, record: LocatorRecord) -> Result<(), StoreError>;
    fn get_all(&self) -> Result<Vec<LocatorRecord>, StoreError>;
    /// Returns whether a record was removed.
    fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

/// Append-only logs. Ids are assigned by the sink.
pub trait LogSink {
    fn append(&self, time: u64, message: &str) -> Result<LogEntry, StoreError>;
    fn entries(&self) -> Result<Vec<LogEntry>, StoreError>;
    fn record_change(
        &self,
        record_id: &str,
        time: u64,
        results: &[ResolutionResult],
        value: &str,
    ) -> Result<ChangeEntry, StoreError>;
    fn changes(&self) -> Result<Vec<ChangeEntry>, StoreError>;
}

pub trait Store: RecordStore + LogSink + Send + Sync {}

impl<T: RecordStore + LogSink + Send + Sync> Store for T {}

/// Shared in-memory contents of both store kinds.
#[derive(Debug, Clone, Default, PartialEq)]
struct Contents {
    records: std::collections::BTreeMap<String, LocatorRecord>,
    logs: Vec<LogEntry>,
    changes: Vec<ChangeEntry>,
}

impl Contents {
    fn append_log(&mut self, time: u64, message: &str) -> LogEntry {
        let entry = LogEntry {
            id: self.logs.last().map_or(1, |l| l.id + 1),
            time,
            message: message.to_string(),
        };
        self.logs.push(entry.clone());
        entry
    }

    fn append_change(
        &mut self,
        record_id: &str,
        time: u64,
        results: &[ResolutionResult],
        value: &str,
    ) -> ChangeEntry {
        let entry = ChangeEntry {
            id: self.changes.last().map_or(1, |c| c.id + 1),
            record_id: record_id.to_string(),
            time,
            results: results.to_vec(),
            value: value.to_string(),
        };
        self.changes.push(entry.clone());
        entry
    }
}
