//! Persistent tier: async string key-value stores.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

/// Failures reported by a [`PersistentStore`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("store I/O failure: {0}")]
    Io(String),

    #[error("corrupted entry for key {key}")]
    Corrupted { key: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Quota failures degrade a write to memory-only instead of failing it.
    pub fn is_quota(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded(_))
    }
}

impl From<StoreError> for cider_common::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::QuotaExceeded(msg) => cider_common::Error::QuotaExceeded(msg),
            other => cider_common::Error::Storage(other.to_string()),
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::StorageFull => StoreError::QuotaExceeded(err.to_string()),
            _ => StoreError::Io(err.to_string()),
        }
    }
}

/// Async key-value store backing the cache's persistent tier.
#[async_trait]
pub trait PersistentStore: Send + Sync + 'static {
    /// Missing keys return `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    async fn list_keys(&self) -> Result<Vec<String>, StoreError>;
}

/// In-process store, optionally bounded by total value bytes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once stored values would exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub async fn len(&self) -> usize {
        self.values.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.lock().await.is_empty()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().await;
        if let Some(quota) = self.quota_bytes {
            let used: usize = values
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            if used + value.len() > quota {
                return Err(StoreError::QuotaExceeded(format!(
                    "{} bytes requested, {} of {} in use",
                    value.len(),
                    used,
                    quota
                )));
            }
        }
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.values.lock().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Directory-backed store: one JSON file per key.
///
/// File names are the hex encoding of the key so arbitrary keys map to
/// portable names. Writes go to a temporary file that is then renamed over
/// the target.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

const FILE_EXT: &str = "json";

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", hex::encode(key.as_bytes()), FILE_EXT))
    }

    fn key_from_file_name(name: &str) -> Option<String> {
        let stem = name.strip_suffix(&format!(".{}", FILE_EXT))?;
        let bytes = hex::decode(stem).ok()?;
        String::from_utf8(bytes).ok()
    }
}

#[async_trait]
impl PersistentStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let target = self.path_for(key);
        let tmp = target.with_extension(format!("{}.tmp", FILE_EXT));
        tokio::fs::write(&tmp, value).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut reader = tokio::fs::read_dir(&self.dir).await?;
        let mut keys = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            if let Some(key) = entry
                .file_name()
                .to_str()
                .and_then(Self::key_from_file_name)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic_ops() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);
        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.list_keys().await.unwrap(), vec!["a", "b"]);
        store.remove("a").await.unwrap();
        store.remove("missing").await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_quota() {
        let store = MemoryStore::with_quota(8);
        store.set("a", "12345").await.unwrap();
        let err = store.set("b", "12345").await.unwrap_err();
        assert!(err.is_quota());
        // Overwriting an existing key only counts the new value.
        store.set("a", "12345678").await.unwrap();
    }

    #[test]
    fn test_store_error_conversion() {
        let quota: cider_common::Error = StoreError::QuotaExceeded("full".into()).into();
        assert_eq!(quota.code(), 31);
        let io: cider_common::Error = StoreError::Io("disk".into()).into();
        assert_eq!(io.code(), 30);
    }

    #[test]
    fn test_io_error_mapping() {
        let full = io::Error::new(io::ErrorKind::StorageFull, "no space");
        assert!(StoreError::from(full).is_quota());
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(StoreError::from(denied), StoreError::Io(_)));
    }

    #[test]
    fn test_file_name_round_trip() {
        let name = format!("{}.json", hex::encode("analytics_cache:trends"));
        assert_eq!(
            FileStore::key_from_file_name(&name).as_deref(),
            Some("analytics_cache:trends")
        );
        assert_eq!(FileStore::key_from_file_name("notes.txt"), None);
        assert_eq!(FileStore::key_from_file_name("zz.json"), None);
    }
}
