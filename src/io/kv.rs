use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tempfile::NamedTempFile;

use crate::io::lock::{LockError, StoreLock};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("malformed store file {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not back up malformed store {path} to {backup}: {source}")]
    BackupError {
        path: PathBuf,
        backup: PathBuf,
        source: io::Error,
    },
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("could not serialize value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persisted key-value storage that survives a process restart.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Process-local store, mostly for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
        Ok(())
    }
}

/// A JSON object on disk, one member per key.
///
/// Every `set` takes the store lock, re-reads the file so that keys written by
/// another process are kept, and replaces the file atomically. A file that no
/// longer parses is copied to `<file>.bak` before it gets overwritten, and is
/// left alone when that copy fails.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(StoreError::ReadError {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| StoreError::Malformed {
            path: self.path.clone(),
            source: e,
        })
    }

    fn backup_path(&self) -> PathBuf {
        self.path.with_extension("json.bak")
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let _lock = StoreLock::acquire_default(&self.path)?;

        let mut values = match self.read_all() {
            Ok(values) => values,
            Err(StoreError::Malformed { source, .. }) => {
                let bak = self.backup_path();
                if let Err(e) = fs::copy(&self.path, &bak) {
                    tracing::warn!(
                        path = %self.path.display(),
                        backup = %bak.display(),
                        error = %e,
                        "could not back up malformed store file, leaving it untouched"
                    );
                    return Err(StoreError::BackupError {
                        path: self.path.clone(),
                        backup: bak,
                        source: e,
                    });
                }
                tracing::warn!(
                    path = %self.path.display(),
                    backup = %bak.display(),
                    error = %source,
                    "store file was malformed, starting fresh"
                );
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        values.insert(key.to_string(), value);

        let content = serde_json::to_string_pretty(&values)?;
        atomic_write(&self.path, content.as_bytes()).map_err(|e| StoreError::WriteError {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn memory_store_get_and_set() {
        let store = MemoryStore::new();
        assert!(store.get("notes").unwrap().is_none());
        store.set("notes", json!([1, 2])).unwrap();
        assert_eq!(store.get("notes").unwrap(), Some(json!([1, 2])));
    }

    #[test]
    fn file_store_missing_file_has_no_keys() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path().join("nk").join("store.json"));
        assert!(store.get("projects").unwrap().is_none());
    }

    #[test]
    fn file_store_keeps_other_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nk").join("store.json");
        let store = JsonFileStore::new(&path);
        store.set("projects", json!([{"id": 1}])).unwrap();
        store.set("notes", json!([])).unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.get("projects").unwrap(), Some(json!([{"id": 1}])));
        assert_eq!(reopened.get("notes").unwrap(), Some(json!([])));
    }

    #[test]
    fn malformed_file_is_reported_then_backed_up_on_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        fs::write(&path, "not json {{{").unwrap();
        let store = JsonFileStore::new(&path);

        assert!(matches!(
            store.get("notes"),
            Err(StoreError::Malformed { .. })
        ));

        store.set("notes", json!([])).unwrap();
        assert_eq!(store.get("notes").unwrap(), Some(json!([])));
        let bak = path.with_extension("json.bak");
        assert_eq!(fs::read_to_string(bak).unwrap(), "not json {{{");
    }

    #[test]
    fn malformed_file_is_kept_when_backup_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        fs::write(&path, "not json {{{").unwrap();
        // A directory in the way makes the copy fail
        fs::create_dir(path.with_extension("json.bak")).unwrap();
        let store = JsonFileStore::new(&path);

        assert!(matches!(
            store.set("notes", json!([])),
            Err(StoreError::BackupError { .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "not json {{{");
    }
}
