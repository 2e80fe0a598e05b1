//! Durable key/value capability the session persists through.
//!
//! The session never touches global storage. It is handed a `StateStore`
//! and calls `get`/`put` on the keys in [`crate::keys`].

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use parking_lot::Mutex;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::StoreResult;
use crate::keys;

/// Key/value store for JSON values.
///
/// All methods take `&self`; implementations manage their own locking.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<Value>>;
    fn put(&self, key: &str, value: Value) -> StoreResult<()>;
    fn remove(&self, key: &str) -> StoreResult<()>;
}

/// In-process store. State is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> StoreResult<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Directory-backed store: one JSON file per key.
///
/// Each `put` writes a temp file in the same directory and renames it over
/// the target, so a single key is never observed half-written.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    // Serializes writers within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(keys::file_name(key))
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let bytes = match fs::read(self.path_for(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn put(&self, key: &str, value: Value) -> StoreResult<()> {
        let _guard = self.write_lock.lock();
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer(&mut tmp, &value)?;
        tmp.flush()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get(keys::VOLUME).unwrap().is_none());

        store.put(keys::VOLUME, json!(0.3)).unwrap();
        assert_eq!(store.get(keys::VOLUME).unwrap(), Some(json!(0.3)));
        assert_eq!(store.len(), 1);

        store.remove(keys::VOLUME).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = TempDir::new().expect("tempdir");
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.put(keys::QUEUE, json!({ "sequence": [1, 2, 3] })).unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        let value = store.get(keys::QUEUE).unwrap().unwrap();
        assert_eq!(value["sequence"], json!([1, 2, 3]));
    }

    #[test]
    fn file_store_overwrites_in_place() {
        let dir = TempDir::new().expect("tempdir");
        let store = FileStore::open(dir.path()).unwrap();

        store.put(keys::PROGRESS, json!(10.0)).unwrap();
        store.put(keys::PROGRESS, json!(20.5)).unwrap();

        assert_eq!(store.get(keys::PROGRESS).unwrap(), Some(json!(20.5)));
        // Only the target file remains; temp files were renamed away.
        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn file_store_missing_key_is_none() {
        let dir = TempDir::new().expect("tempdir");
        let store = FileStore::open(dir.path().join("nested")).unwrap();
        assert!(store.get(keys::LOOP_MODE).unwrap().is_none());
        store.remove(keys::LOOP_MODE).unwrap();
    }

    #[test]
    fn file_store_reports_corrupt_json() {
        let dir = TempDir::new().expect("tempdir");
        let store = FileStore::open(dir.path()).unwrap();
        fs::write(dir.path().join(keys::file_name(keys::VOLUME)), b"{not json").unwrap();

        match store.get(keys::VOLUME) {
            Err(StoreError::Json(_)) => {}
            other => panic!("expected json error, got {other:?}"),
        }
    }
}
