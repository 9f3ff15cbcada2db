//! Key-value storage devices holding opaque string blobs.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use log::debug;
use thiserror::Error;

/// Opaque get/set/clear store for session blobs.
pub trait Storage {
    /// Returns the blob stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous blob.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes every stored blob.
    fn clear(&mut self) -> Result<(), StorageError>;
}

/// Failures raised by storage devices.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing file could not be read.
    #[error("failed to read storage file {path:?}: {source}")]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The backing file could not be written or removed.
    #[error("failed to write storage file {path:?}: {source}")]
    Write {
        /// File that was being written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The backing file does not hold a JSON object of strings.
    #[error("storage file {path:?} is not a string map: {source}")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying JSON failure.
        #[source]
        source: serde_json::Error,
    },
    /// The in-memory map could not be rendered as JSON.
    #[error("failed to encode storage contents: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Volatile storage living only as long as the value itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether the store holds no blobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let _ = self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.entries.clear();
        Ok(())
    }
}

/// Storage backed by a single JSON object file mapping keys to blobs.
///
/// A missing file reads as an empty store. Every write rewrites the file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Creates a store persisting to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|source| StorageError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!("wrote {} storage entries to {:?}", entries.len(), self.path);
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut entries = self.load()?;
        Ok(entries.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.load()?;
        let _ = entries.insert(key.to_owned(), value.to_owned());
        self.store(&entries)
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_overwrites_and_clears() {
        let mut storage = MemoryStorage::new();
        storage.set("key", "first").expect("set");
        storage.set("key", "second").expect("set");
        assert_eq!(storage.get("key").expect("get").as_deref(), Some("second"));
        assert_eq!(storage.len(), 1);

        storage.clear().expect("clear");
        assert!(storage.is_empty());
        assert_eq!(storage.get("key").expect("get"), None);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = FileStorage::new(dir.path().join("absent.json"));
        assert_eq!(storage.get("anything").expect("get"), None);
    }

    #[test]
    fn file_storage_persists_between_handles() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("session.json");
        let mut writer = FileStorage::new(&path);
        writer.set("player_position", "1,2").expect("set");
        writer.set("held_token", "").expect("set");

        let reader = FileStorage::new(&path);
        assert_eq!(
            reader.get("player_position").expect("get").as_deref(),
            Some("1,2")
        );
        assert_eq!(reader.get("held_token").expect("get").as_deref(), Some(""));

        writer.clear().expect("clear");
        assert!(!path.exists());
        writer.clear().expect("clearing twice is harmless");
    }

    #[test]
    fn corrupt_file_reports_parse_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "[1, 2, 3]").expect("write fixture");

        let storage = FileStorage::new(&path);
        assert!(matches!(
            storage.get("cache_state"),
            Err(StorageError::Parse { .. })
        ));
    }
}
