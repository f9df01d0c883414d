use super::{ChangeEntry, Contents, LogEntry, LogSink, RecordStore, StoreError};
use pathmark_common::record::{LocatorRecord, ResolutionResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Current on-disk schema. Version 1 held records only, version 2 added the
/// log, version 3 the change log.
pub const SCHEMA_VERSION: u32 = 3;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    records: Vec<LocatorRecord>,
    #[serde(default)]
    logs: Vec<LogEntry>,
    #[serde(default)]
    changes: Vec<ChangeEntry>,
}

#[derive(Deserialize)]
struct VersionHeader {
    #[serde(default = "first_version")]
    version: u32,
}

fn first_version() -> u32 {
    1
}

/// Store persisted as one JSON document, rewritten on every mutation.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    contents: Mutex<Contents>,
}

impl JsonFileStore {
    /// Opens `path`, creating an empty store when the file does not exist.
    /// Older schema versions are upgraded and written back.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let (contents, version) = if path.exists() {
            read_file(&path)?
        } else {
            (Contents::default(), SCHEMA_VERSION)
        };

        let store = Self {
            path,
            contents: Mutex::new(contents),
        };
        if version < SCHEMA_VERSION {
            info!(
                path = %store.path.display(),
                from = version,
                to = SCHEMA_VERSION,
                "Upgrading record store"
            );
            store.persist(&*store.lock()?)?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Contents>, StoreError> {
        self.contents.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Applies `f` to a copy and keeps it only once the file is written, so a
    /// failed write leaves memory matching disk.
    fn mutate<T>(&self, f: impl FnOnce(&mut Contents) -> T) -> Result<T, StoreError> {
        let mut contents = self.lock()?;
        let mut next = contents.clone();
        let out = f(&mut next);
        self.persist(&next)?;
        *contents = next;
        Ok(out)
    }

    fn persist(&self, contents: &Contents) -> Result<(), StoreError> {
        let file = StoreFile {
            version: SCHEMA_VERSION,
            records: contents.records.values().cloned().collect(),
            logs: contents.logs.clone(),
            changes: contents.changes.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), records = file.records.len(), "Store written");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn read_file(path: &Path) -> Result<(Contents, u32), StoreError> {
    let text = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if text.trim().is_empty() {
        return Ok((Contents::default(), first_version()));
    }

    let header: VersionHeader = serde_json::from_str(&text)?;
    if header.version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: header.version,
            supported: SCHEMA_VERSION,
        });
    }

    let file: StoreFile = serde_json::from_str(&text)?;
    let mut contents = Contents {
        records: file
            .records
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect(),
        logs: file.logs,
        changes: file.changes,
    };
    if header.version < 2 {
        contents.logs.clear();
    }
    if header.version < 3 {
        contents.changes.clear();
    }
    Ok((contents, header.version))
}

impl RecordStore for JsonFileStore {
    fn get(&self, id: &str) -> Result<Option<LocatorRecord>, StoreError> {
        Ok(self.lock()?.records.get(id).cloned())
    }

    fn put(&self, record: LocatorRecord) -> Result<(), StoreError> {
        self.mutate(|c| {
            c.records.insert(record.id.clone(), record);
        })
    }

    fn get_all(&self) -> Result<Vec<LocatorRecord>, StoreError> {
        Ok(self.lock()?.records.values().cloned().collect())
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.mutate(|c| c.records.remove(id).is_some())
    }
}

impl LogSink for JsonFileStore {
    fn append(&self, time: u64, message: &str) -> Result<LogEntry, StoreError> {
        self.mutate(|c| c.append_log(time, message))
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
        self.mutate(|c| c.append_change(record_id, time, results, value))
    }

    fn changes(&self) -> Result<Vec<ChangeEntry>, StoreError> {
        Ok(self.lock()?.changes.clone())
    }
}
