use super::{ChangeEntry, Contents, LogEntry, LogSink, RecordStore, StoreError};
use pathmark_common::record::{LocatorRecord, ResolutionResult};
use std::sync::{Arc, Mutex, MutexGuard};

/// Volatile store. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    contents: Arc<Mutex<Contents>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Contents>, StoreError> {
        self.contents.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<LocatorRecord>, StoreError> {
        Ok(self.lock()?.records.get(id).cloned())
    }

    fn put(&self, record: LocatorRecord) -> Result<(), StoreError> {
        self.lock()?.records.insert(record.id.clone(), record);
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<LocatorRecord>, StoreError> {
        Ok(self.lock()?.records.values().cloned().collect())
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.records.remove(id).is_some())
    }
}

impl LogSink for MemoryStore {
    fn append(&self, time: u64, message: &str) -> Result<LogEntry, StoreError> {
        Ok(self.lock()?.append_log(time, message))
    }

    fn entries(&self) -> Result<Vec<LogEntry>, StoreError> {
        Ok(self.lock()?.logs.clone())
    }

    fn record_change(
        &self,
        record_id: &str,
        time: u64,
        results: &[ResolutionResult],
        value: &str,
    ) -> Result<ChangeEntry, StoreError> {
        Ok(self.lock()?.append_change(record_id, time, results, value))
    }

    fn changes(&self) -> Result<Vec<ChangeEntry>, StoreError> {
        Ok(self.lock()?.changes.clone())
    }
}
