//! File-backed key/value store
//!
//! The whole map is one JSON object on disk. Every mutation rewrites the
//! file through [`tempfile::NamedTempFile`] in the same directory and
//! persists it over the old file, which is an atomic rename on every
//! supported platform.

use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};

type Entries = BTreeMap<String, String>;

/// JSON key/value file with atomic replacement
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileKeyValueStore {
    /// Open (lazily) the store at `path`. The file and its parent directory
    /// are created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one value. A file that is not a JSON object of strings is
    /// logged and read as empty, the same way the next write discards it.
    ///
    /// # Errors
    /// Returns `StorageError::Io` if the file exists but cannot be read.
    pub fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.read_entries_or_empty()?.remove(key))
    }

    /// Write one value.
    ///
    /// # Errors
    /// Returns `StorageError::Io` if the file cannot be replaced.
    pub fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.set_many(&[(key, value)])
    }

    /// Write several values in one atomic replacement.
    ///
    /// # Errors
    /// Returns `StorageError::Io` if the file cannot be replaced.
    pub fn set_many(&self, pairs: &[(&str, &str)]) -> StorageResult<()> {
        self.replace(pairs, &[])
    }

    /// Remove several keys in one atomic replacement. Missing keys are
    /// ignored.
    ///
    /// # Errors
    /// Returns `StorageError::Io` if the file cannot be replaced.
    pub fn remove_many(&self, keys: &[&str]) -> StorageResult<()> {
        self.replace(&[], keys)
    }

    /// Write `set` and remove `remove` in one atomic replacement.
    ///
    /// # Errors
    /// Returns `StorageError::Io` if the file cannot be replaced.
    pub fn replace(&self, set: &[(&str, &str)], remove: &[&str]) -> StorageResult<()> {
        self.update(|entries| {
            for key in remove {
                entries.remove(*key);
            }
            for (key, value) in set {
                entries.insert((*key).to_string(), (*value).to_string());
            }
        })
    }

    fn update(&self, mutate: impl FnOnce(&mut Entries)) -> StorageResult<()> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_entries_or_empty()?;
        mutate(&mut entries);
        self.write_entries(&entries)
    }

    fn read_entries_or_empty(&self) -> StorageResult<Entries> {
        match self.read_entries() {
            Ok(entries) => Ok(entries),
            Err(StorageError::Corrupt(reason)) => {
                warn!(path = %self.path.display(), %reason, "Discarding corrupt store file");
                Ok(Entries::new())
            }
            Err(e) => Err(e),
        }
    }

    fn read_entries(&self) -> StorageResult<Entries> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    fn write_entries(&self, entries: &Entries) -> StorageResult<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(&mut tmp, entries)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;

        debug!(path = %self.path.display(), keys = entries.len(), "Store file replaced");
        Ok(())
    }
}
