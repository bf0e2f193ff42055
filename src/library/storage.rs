//! Key-value text storage for the clip library
//!
//! Two stores share one contract: `get` returns the text stored under a key,
//! `set` replaces it or fails without changing anything. Both enforce a
//! byte quota over everything they hold.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Extension of files written by `FileStore`
const STORE_EXTENSION: &str = "json";

/// Storage-related errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage quota exceeded (need {required} bytes, quota {quota} bytes)")]
    QuotaExceeded { required: usize, quota: usize },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage task failed: {0}")]
    Task(String),

    #[error("Storage unreadable: {0}")]
    Unreadable(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable text storage addressed by key
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Text stored under `key`, if any
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replace the text stored under `key`
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;
}

fn check_quota(quota: Option<usize>, required: usize) -> StorageResult<()> {
    match quota {
        Some(quota) if required > quota => Err(StorageError::QuotaExceeded { required, quota }),
        _ => Ok(()),
    }
}

/// In-memory store, counting key and value bytes against the quota
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new(quota: Option<usize>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota,
        }
    }

    /// Bytes currently held
    pub fn used_bytes(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.entries.lock();
        let others: usize = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum();
        check_quota(self.quota, others + key.len() + value.len())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Directory-backed store: one `<key>.json` file per key
///
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so a key always holds either the old or the new text.
pub struct FileStore {
    dir: PathBuf,
    quota: Option<usize>,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating it if needed
    pub fn open(dir: impl Into<PathBuf>, quota: Option<usize>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        tracing::debug!("Opened file store at {:?}", dir);
        Ok(Self { dir, quota })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(dir: &Path, key: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(dir.join(format!("{}.{}", key, STORE_EXTENSION)))
    }

    /// Bytes held by every key except `exclude`
    fn used_bytes_except(dir: &Path, exclude: &Path) -> StorageResult<usize> {
        let mut total = 0;
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_store_file = path.extension().and_then(|e| e.to_str()) == Some(STORE_EXTENSION);
            if path == exclude || !is_store_file {
                continue;
            }
            total += fs::metadata(&path)?.len() as usize;
        }
        Ok(total)
    }

    fn write_atomic(dir: &Path, path: &Path, value: &str) -> StorageResult<()> {
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(value.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| StorageError::Io(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = Self::path_for(&self.dir, key)?;
        tokio::task::spawn_blocking(move || match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = Self::path_for(&self.dir, key)?;
        let dir = self.dir.clone();
        let quota = self.quota;
        let value = value.to_string();
        tokio::task::spawn_blocking(move || {
            let others = Self::used_bytes_except(&dir, &path)?;
            check_quota(quota, others + value.len())?;
            Self::write_atomic(&dir, &path, &value)?;
            tracing::debug!("Wrote {} bytes to {:?}", value.len(), path);
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::default();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "one").await.unwrap();
        store.set("k", "two").await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("two"));
        assert_eq!(store.used_bytes(), 4);
    }

    #[tokio::test]
    async fn test_memory_store_quota_leaves_value_unchanged() {
        let store = MemoryStore::new(Some(8));
        store.set("k", "small").await.unwrap();

        let err = store.set("k", "far too large").await.unwrap_err();

        assert!(matches!(err, StorageError::QuotaExceeded { quota: 8, .. }));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("small"));
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        {
            let store = FileStore::open(dir.path(), None).unwrap();
            store.set("savedVideos", "[]").await.unwrap();
        }

        let store = FileStore::open(dir.path(), None).unwrap();
        assert_eq!(store.get("savedVideos").await.unwrap().as_deref(), Some("[]"));
        assert_eq!(store.get("missing").await.unwrap(), None);
        assert!(dir.path().join("savedVideos.json").exists());
    }

    #[tokio::test]
    async fn test_file_store_quota_counts_other_keys() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), Some(10)).unwrap();
        store.set("a", "123456").await.unwrap();
        // Replacing a key does not count its old contents
        store.set("a", "1234567").await.unwrap();

        let err = store.set("b", "1234").await.unwrap_err();

        assert!(matches!(err, StorageError::QuotaExceeded { required: 11, quota: 10 }));
        assert_eq!(store.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_keys() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), None).unwrap();
        assert!(matches!(
            store.set("../escape", "x").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
