//! Durable Tier Module
//!
//! String-keyed stores that mirror `persistent` cache entries so they survive
//! a process restart. Values are serialized [`CacheEntry`](super::CacheEntry)
//! documents; the stores themselves treat them as opaque strings.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{StorageError, StorageResult};

// == Durable Store Trait ==
/// A persistent key-value surface addressed by full cache keys.
pub trait DurableStore: Send + Sync + Debug {
    /// A name for logging, e.g. "memory" or "file".
    fn name(&self) -> &'static str;

    /// Returns the raw value stored under `key`.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: String) -> StorageResult<()>;

    /// Removes `key`. Absent keys are not an error.
    fn remove(&mut self, key: &str) -> StorageResult<()>;

    /// Removes every key starting with `scope` in one step. Returns how
    /// many keys were removed.
    fn remove_prefix(&mut self, scope: &str) -> StorageResult<usize>;

    /// Lists every stored key.
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Removes everything.
    fn clear(&mut self) -> StorageResult<()>;
}

fn check_quota(needed: usize, quota: Option<usize>) -> StorageResult<()> {
    match quota {
        Some(quota) if needed > quota => Err(StorageError::QuotaExceeded { needed, quota }),
        _ => Ok(()),
    }
}

// == Memory Durable Store ==
#[derive(Debug, Default)]
struct MemoryItems {
    items: HashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryItems {
    fn used_bytes(&self) -> usize {
        self.items.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

/// In-process durable store.
///
/// Clones share the same items, so a store handed to one cache manager can be
/// handed to a fresh manager to simulate a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryDurableStore {
    inner: Arc<Mutex<MemoryItems>>,
}

impl MemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that refuses writes once keys plus values exceed
    /// `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryItems {
                items: HashMap::new(),
                quota: Some(quota),
            })),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, MemoryItems> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DurableStore for MemoryDurableStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock().items.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> StorageResult<()> {
        let mut guard = self.lock();
        let replaced = guard.items.get(key).map_or(0, |old| key.len() + old.len());
        let needed = guard.used_bytes() - replaced + key.len() + value.len();
        check_quota(needed, guard.quota)?;
        guard.items.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.lock().items.remove(key);
        Ok(())
    }

    fn remove_prefix(&mut self, scope: &str) -> StorageResult<usize> {
        let mut guard = self.lock();
        let before = guard.items.len();
        guard.items.retain(|key, _| !key.starts_with(scope));
        Ok(before - guard.items.len())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.lock().items.keys().cloned().collect())
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.lock().items.clear();
        Ok(())
    }
}

// == File Durable Store ==
/// Durable store backed by a single JSON document on disk.
///
/// The whole document is rewritten on every mutation through a temporary file
/// and a rename, so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct FileDurableStore {
    path: PathBuf,
    items: BTreeMap<String, String>,
    quota: Option<usize>,
}

impl FileDurableStore {
    /// Opens the store at `path`, loading existing items. A missing file is
    /// an empty store.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let items = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), items = items.len(), "Opened durable cache file");
        Ok(Self {
            path,
            items,
            quota: None,
        })
    }

    /// Limits the serialized document to `quota` bytes.
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, document: &str) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, document)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Applies `change`, then writes the result; the change is undone if the
    /// document is over quota or the write fails.
    fn commit<F>(&mut self, change: F) -> StorageResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let before = self.items.clone();
        change(&mut self.items);

        let result = serde_json::to_string(&self.items)
            .map_err(StorageError::from)
            .and_then(|document| {
                check_quota(document.len(), self.quota)?;
                self.flush(&document)
            });

        if result.is_err() {
            self.items = before;
        }
        result
    }
}

impl DurableStore for FileDurableStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> StorageResult<()> {
        self.commit(|items| {
            items.insert(key.to_string(), value);
        })
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        if !self.items.contains_key(key) {
            return Ok(());
        }
        self.commit(|items| {
            items.remove(key);
        })
    }

    fn remove_prefix(&mut self, scope: &str) -> StorageResult<usize> {
        let matching = self.items.keys().filter(|key| key.starts_with(scope)).count();
        if matching == 0 {
            return Ok(0);
        }
        self.commit(|items| items.retain(|key, _| !key.starts_with(scope)))?;
        Ok(matching)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.items.keys().cloned().collect())
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.commit(BTreeMap::clear)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryDurableStore::new();
        store.set("cache:a", "1".to_string()).unwrap();

        assert_eq!(store.get("cache:a").unwrap(), Some("1".to_string()));
        assert_eq!(store.get("cache:b").unwrap(), None);

        store.remove("cache:a").unwrap();
        store.remove("cache:a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_store_clones_share_items() {
        let mut store = MemoryDurableStore::new();
        let other = store.clone();

        store.set("k", "v".to_string()).unwrap();
        assert_eq!(other.get("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_memory_store_quota() {
        let mut store = MemoryDurableStore::with_quota(8);
        store.set("ab", "cdef".to_string()).unwrap();

        // Overwriting the same key is measured against the replaced size
        store.set("ab", "cdefgh".to_string()).unwrap();

        let err = store.set("x", "yz".to_string()).unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { needed: 11, quota: 8 }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_file_store_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        {
            let mut store = FileDurableStore::open(&path).unwrap();
            store.set("cache:a", "{\"x\":1}".to_string()).unwrap();
            store.set("user:b", "2".to_string()).unwrap();
            store.remove("user:b").unwrap();
        }

        let store = FileDurableStore::open(&path).unwrap();
        assert_eq!(store.keys().unwrap(), vec!["cache:a".to_string()]);
        assert_eq!(store.get("cache:a").unwrap(), Some("{\"x\":1}".to_string()));
    }

    #[test]
    fn test_file_store_quota_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileDurableStore::open(dir.path().join("c.json"))
            .unwrap()
            .with_quota(32);

        store.set("a", "1".to_string()).unwrap();
        let err = store.set("b", "x".repeat(64)).unwrap_err();

        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert_eq!(store.get("b").unwrap(), None);

        let reopened = FileDurableStore::open(store.path()).unwrap();
        assert_eq!(reopened.keys().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_file_store_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        fs::write(&path, "not json").unwrap();

        let err = FileDurableStore::open(&path).unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn test_file_store_remove_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        let mut store = FileDurableStore::open(&path).unwrap();
        for key in ["user:1", "user:2", "user:3", "users:1", "cache:user"] {
            store.set(key, "1".to_string()).unwrap();
        }

        assert_eq!(store.remove_prefix("user:").unwrap(), 3);
        assert_eq!(store.remove_prefix("user:").unwrap(), 0);

        let reopened = FileDurableStore::open(&path).unwrap();
        assert_eq!(
            reopened.keys().unwrap(),
            vec!["cache:user".to_string(), "users:1".to_string()]
        );
    }

    #[test]
    fn test_memory_store_remove_prefix() {
        let mut store = MemoryDurableStore::new();
        store.set("a:1", "1".to_string()).unwrap();
        store.set("a:2", "2".to_string()).unwrap();
        store.set("ab:1", "3".to_string()).unwrap();

        assert_eq!(store.remove_prefix("a:").unwrap(), 2);
        assert_eq!(store.keys().unwrap(), vec!["ab:1".to_string()]);
    }

    #[test]
    fn test_file_store_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileDurableStore::open(dir.path().join("c.json")).unwrap();
        store.set("a", "1".to_string()).unwrap();
        store.clear().unwrap();

        assert!(store.keys().unwrap().is_empty());
        let reopened = FileDurableStore::open(store.path()).unwrap();
        assert!(reopened.keys().unwrap().is_empty());
    }
}
