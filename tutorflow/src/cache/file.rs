//! JSON file backed cache.

use super::CacheStore;
use crate::errors::CacheIoError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A cache persisted as one JSON object mapping prompt to response.
///
/// Every `get` reads the whole file and every `put` reloads it, merges the
/// new entry and rewrites it, so several processes sharing the file see each
/// other's entries. Writes go through a temporary file in the same directory
/// and a rename, so a reader never observes a half-written file. Within one
/// process the reload-merge-write sequence is serialized.
#[derive(Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileCache {
    /// Creates a cache backed by `path`. The file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the full mapping. A missing file is an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON object
    /// of strings.
    pub fn try_load(&self) -> Result<BTreeMap<String, String>, CacheIoError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_str(&raw).map_err(|e| self.io_error(e))
    }

    /// Writes the full mapping atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be written or renamed.
    pub fn try_store(&self, entries: &BTreeMap<String, String>) -> Result<(), CacheIoError> {
        let json = serde_json::to_string_pretty(entries).map_err(|e| self.io_error(e))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        temp.write_all(json.as_bytes()).map_err(|e| self.io_error(e))?;
        temp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        temp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }

    /// Number of entries currently on disk. Unreadable files count as empty.
    #[must_use]
    pub fn len(&self) -> usize {
        self.try_load().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns true if no entries are on disk.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn io_error(&self, error: impl std::fmt::Display) -> CacheIoError {
        CacheIoError::new(self.path.display().to_string(), error.to_string())
    }

    fn load_or_empty(&self) -> BTreeMap<String, String> {
        self.try_load().unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable cache file");
            BTreeMap::new()
        })
    }
}

impl CacheStore for JsonFileCache {
    fn get(&self, key: &str) -> Option<String> {
        self.load_or_empty().remove(key)
    }

    fn put(&self, key: &str, value: &str) {
        let _guard = self.write_lock.lock();

        let mut entries = self.load_or_empty();
        if entries.contains_key(key) {
            tracing::debug!(path = %self.path.display(), "Cache entry already recorded, keeping first response");
            return;
        }
        entries.insert(key.to_string(), value.to_string());

        if let Err(e) = self.try_store(&entries) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write cache file");
        }
    }
}
