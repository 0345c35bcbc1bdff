//! Key-value blob persistence with file locking.
//!
//! Every persisted record (user progress, session checkpoints, daily plans,
//! history logs) is a JSON blob stored under a string key. The file-backed
//! store keeps one file per key and writes atomically.

use crate::{Error, Result};
use chrono::NaiveDate;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Generic string-keyed blob store
pub trait BlobStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
    fn list_keys(&self) -> Result<Vec<String>>;
}

/// Key layout shared by every component
pub mod keys {
    use chrono::NaiveDate;

    pub const PROGRESS: &str = "progress";
    pub const SESSION_PREFIX: &str = "session.";
    pub const PLAN_PREFIX: &str = "plan.";
    pub const HISTORY_PREFIX: &str = "history.";

    pub fn session(exercise_id: &str, date: NaiveDate) -> String {
        format!("{}{}.{}", SESSION_PREFIX, exercise_id, date)
    }

    pub fn plan(date: NaiveDate) -> String {
        format!("{}{}", PLAN_PREFIX, date)
    }

    pub fn history(date: NaiveDate) -> String {
        format!("{}{}", HISTORY_PREFIX, date)
    }
}

/// Parse the date suffix of a `history.<date>` or `plan.<date>` key
pub fn date_from_key(key: &str, prefix: &str) -> Option<NaiveDate> {
    key.strip_prefix(prefix)
        .and_then(|rest| NaiveDate::parse_from_str(rest, "%Y-%m-%d").ok())
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(Error::PersistenceWrite(format!("invalid key '{}'", key)))
    }
}

// ============================================================================
// File store
// ============================================================================

/// One JSON file per key under a data directory
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

impl BlobStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key).map_err(|e| Error::PersistenceRead(e.to_string()))?;
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)
            .map_err(|e| Error::PersistenceRead(format!("open {:?}: {}", path, e)))?;

        // Acquire shared lock for reading
        file.lock_shared()
            .map_err(|e| Error::PersistenceRead(format!("lock {:?}: {}", path, e)))?;

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        let read = reader.read_to_string(&mut contents);
        let _ = file.unlock();
        read.map_err(|e| Error::PersistenceRead(format!("read {:?}: {}", path, e)))?;

        Ok(Some(contents))
    }

    /// Atomically writes the blob by:
    /// 1. Writing to a temp file in the same directory
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let write = || -> Result<()> {
            std::fs::create_dir_all(&self.root)?;
            let temp = NamedTempFile::new_in(&self.root)?;

            // Exclusive lock on the temp file serializes concurrent writers
            temp.as_file().lock_exclusive()?;
            {
                let mut writer = std::io::BufWriter::new(temp.as_file());
                writer.write_all(value.as_bytes())?;
                writer.flush()?;
            }
            temp.as_file().sync_all()?;
            temp.as_file().unlock()?;

            temp.persist(self.path_for(key))
                .map_err(|e| Error::Io(e.error))?;
            Ok(())
        };

        write().map_err(|e| Error::PersistenceWrite(format!("{}: {}", key, e)))?;
        tracing::debug!("Saved blob {}", key);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Deleted blob {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::PersistenceWrite(format!("delete {}: {}", key, e))),
        }
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| Error::PersistenceRead(format!("list {:?}: {}", self.root, e)))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::PersistenceRead(e.to_string()))?;
            let name = entry.file_name();
            if let Some(key) = name.to_str().and_then(|n| n.strip_suffix(".json")) {
                if validate_key(key).is_ok() {
                    keys.push(key.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

// ============================================================================
// Memory store
// ============================================================================

/// In-memory store, used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.blobs.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.blobs
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.blobs.borrow_mut().remove(key);
        Ok(())
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.blobs.borrow().keys().cloned().collect())
    }
}

// ============================================================================
// Typed helpers
// ============================================================================

/// Load and parse a record, treating every failure as "no data yet"
///
/// Read failures and malformed blobs are logged; callers continue with
/// their defaults.
pub fn load_record<T: DeserializeOwned>(store: &dyn BlobStore, key: &str) -> Option<T> {
    match try_load_record(store, key) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!("{}. Using defaults.", e);
            None
        }
    }
}

/// Load and parse a record, reporting read and parse failures
pub fn try_load_record<T: DeserializeOwned>(store: &dyn BlobStore, key: &str) -> Result<Option<T>> {
    let Some(contents) = store.get(key)? else {
        return Ok(None);
    };

    serde_json::from_str::<T>(&contents)
        .map(Some)
        .map_err(|e| Error::MalformedRecord(format!("{}: {}", key, e)))
}

/// Load a record that is about to be rewritten
///
/// A malformed blob is replaced with the caller's default, but a failed read
/// is returned so existing data is never overwritten blind.
pub fn load_for_update<T: DeserializeOwned>(store: &dyn BlobStore, key: &str) -> Result<Option<T>> {
    match try_load_record(store, key) {
        Err(Error::MalformedRecord(msg)) => {
            tracing::warn!("Malformed record {}. Replacing it.", msg);
            Ok(None)
        }
        other => other,
    }
}

/// Serialize and store a record
pub fn save_record<T: Serialize>(store: &dyn BlobStore, key: &str, record: &T) -> Result<()> {
    // Compact JSON keeps per-day logs small
    let contents = serde_json::to_string(record)
        .map_err(|e| Error::PersistenceWrite(format!("{}: {}", key, e)))?;
    store.set(key, &contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn test_file_store_set_get_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());

        store.set("plan.2024-01-01", "{}").unwrap();
        assert_eq!(store.get("plan.2024-01-01").unwrap(), Some("{}".into()));

        store.delete("plan.2024-01-01").unwrap();
        assert_eq!(store.get("plan.2024-01-01").unwrap(), None);

        // Deleting an absent key is fine
        store.delete("plan.2024-01-01").unwrap();
    }

    #[test]
    fn test_file_store_list_keys_sorted() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path().join("nested"));

        assert!(store.list_keys().unwrap().is_empty());

        store.set("history.2024-01-02", "[]").unwrap();
        store.set("history.2024-01-01", "[]").unwrap();
        store.set("progress", "{}").unwrap();

        assert_eq!(
            store.list_keys().unwrap(),
            vec!["history.2024-01-01", "history.2024-01-02", "progress"]
        );
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());

        assert!(store.set("../escape", "x").is_err());
        assert!(store.set("a/b", "x").is_err());
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());

        store.set("progress", "{}").unwrap();
        store.set("progress", "{\"a\":1}").unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "progress.json")
            .collect();
        assert!(extras.is_empty(), "Found extras: {:?}", extras);
    }

    #[test]
    fn test_load_record_treats_malformed_as_absent() {
        let store = MemoryStore::new();
        store.set("progress", "{ invalid json }").unwrap();

        let loaded: Option<Sample> = load_record(&store, "progress");
        assert!(loaded.is_none());

        let err = try_load_record::<Sample>(&store, "progress").unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));

        let for_update: Option<Sample> = load_for_update(&store, "progress").unwrap();
        assert!(for_update.is_none());
    }

    #[test]
    fn test_record_roundtrip() {
        let store = MemoryStore::new();
        save_record(&store, "progress", &Sample { value: 7 }).unwrap();
        let loaded: Option<Sample> = load_record(&store, "progress");
        assert_eq!(loaded, Some(Sample { value: 7 }));
    }

    #[test]
    fn test_keys_and_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(keys::session("bird_dog", date), "session.bird_dog.2024-05-06");
        assert_eq!(keys::history(date), "history.2024-05-06");
        assert_eq!(
            date_from_key("history.2024-05-06", keys::HISTORY_PREFIX),
            Some(date)
        );
        assert_eq!(date_from_key("history.garbage", keys::HISTORY_PREFIX), None);
    }
}
