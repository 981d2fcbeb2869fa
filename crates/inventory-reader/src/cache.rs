//! Local materialization cache.
//!
//! Tracks one local copy per data-file key for formats that can only be
//! decoded from disk. An entry becomes ready once its download finishes and
//! is removed, together with its file, when the reader holding it is closed.

use crate::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;

/// A data file copied (or being copied) to local disk.
#[derive(Debug)]
pub struct MaterializedFile {
    key: String,
    index_in_manifest: Option<usize>,
    local_path: OnceCell<PathBuf>,
    /// Set once the local copy has been deleted.
    removed: AtomicBool,
}

impl MaterializedFile {
    fn new(key: &str, index_in_manifest: Option<usize>) -> Self {
        Self {
            key: key.to_string(),
            index_in_manifest,
            local_path: OnceCell::new(),
            removed: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn index_in_manifest(&self) -> Option<usize> {
        self.index_in_manifest
    }

    /// Path of the local copy, once the download has completed.
    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.get().map(PathBuf::as_path)
    }

    pub fn is_ready(&self) -> bool {
        self.local_path.initialized()
    }
}

/// Key to local-copy map shared by the reader factory and its readers.
#[derive(Debug, Default)]
pub struct MaterializationCache {
    entries: Mutex<HashMap<String, Arc<MaterializedFile>>>,
}

impl MaterializationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<MaterializedFile>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The entry for `key`, inserting a not-yet-ready one if absent.
    pub fn entry(&self, key: &str, index_in_manifest: Option<usize>) -> Arc<MaterializedFile> {
        self.lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(MaterializedFile::new(key, index_in_manifest)))
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<Arc<MaterializedFile>> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Make sure `file` has a local copy, running `fetch` if it has none.
    ///
    /// Concurrent callers for the same entry wait for a single `fetch`. If
    /// `fetch` fails the entry is evicted so that no half-initialized entry
    /// stays behind; `fetch` is responsible for removing its own partial file.
    /// A waiter whose own `fetch` then succeeds puts the entry back unless the
    /// key has been claimed by a newer entry in the meantime.
    pub async fn materialize<F, Fut>(&self, file: &Arc<MaterializedFile>, fetch: F) -> Result<PathBuf>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PathBuf>>,
    {
        match file.local_path.get_or_try_init(fetch).await {
            Ok(path) => {
                let mut entries = self.lock();
                if !file.removed.load(Ordering::SeqCst) {
                    entries
                        .entry(file.key.clone())
                        .or_insert_with(|| file.clone());
                }
                Ok(path.clone())
            }
            Err(e) => {
                self.evict(file);
                Err(e)
            }
        }
    }

    /// Remove `file` from the cache and delete its local copy.
    ///
    /// The local copy is deleted by the first release of the entry, whether or
    /// not the entry is still the cached one for its key. Returns `false` when
    /// there was nothing left to do, which happens when another reader sharing
    /// the entry released it first.
    pub fn release(&self, file: &Arc<MaterializedFile>) -> std::io::Result<bool> {
        let (evicted, delete) = {
            let mut entries = self.lock();
            let evicted = Self::evict_locked(&mut entries, file);
            let delete = file.local_path().is_some() && !file.removed.swap(true, Ordering::SeqCst);
            (evicted, delete)
        };
        let Some(path) = file.local_path().filter(|_| delete) else {
            return Ok(evicted);
        };

        tracing::debug!("Removing local copy of {}: {}", file.key, path.display());
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e),
        }
    }

    fn evict(&self, file: &Arc<MaterializedFile>) -> bool {
        Self::evict_locked(&mut self.lock(), file)
    }

    fn evict_locked(
        entries: &mut HashMap<String, Arc<MaterializedFile>>,
        file: &Arc<MaterializedFile>,
    ) -> bool {
        match entries.get(&file.key) {
            Some(current) if Arc::ptr_eq(current, file) => {
                entries.remove(&file.key);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InventoryError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_entry_is_shared_per_key() {
        let cache = MaterializationCache::new();
        let first = cache.entry("a.orc", Some(0));
        let second = cache.entry("a.orc", Some(0));
        let other = cache.entry("b.orc", Some(1));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(cache.len(), 2);
        assert!(!first.is_ready());
        assert_eq!(other.index_in_manifest(), Some(1));
    }

    #[tokio::test]
    async fn test_materialize_runs_fetch_once() {
        let dir = TempDir::new().unwrap();
        let cache = MaterializationCache::new();
        let entry = cache.entry("a.orc", Some(0));
        let fetches = AtomicUsize::new(0);
        let target = dir.path().join("a.orc");

        for _ in 0..3 {
            let path = cache
                .materialize(&entry, || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    std::fs::write(&target, b"data")?;
                    Ok(target.clone())
                })
                .await
                .unwrap();
            assert_eq!(path, target);
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert!(entry.is_ready());
        assert_eq!(entry.local_path(), Some(target.as_path()));
    }

    #[tokio::test]
    async fn test_failed_materialize_evicts_entry() {
        let cache = MaterializationCache::new();
        let entry = cache.entry("a.orc", None);

        let result = cache
            .materialize(&entry, || async {
                Err(InventoryError::UnsupportedFormat("boom".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert!(!entry.is_ready());
        assert!(cache.get("a.orc").is_none());
    }

    #[tokio::test]
    async fn test_release_deletes_file_once() {
        let dir = TempDir::new().unwrap();
        let cache = MaterializationCache::new();
        let entry = cache.entry("a.orc", Some(0));
        let target = dir.path().join("a.orc");
        cache
            .materialize(&entry, || async {
                std::fs::write(&target, b"data")?;
                Ok(target.clone())
            })
            .await
            .unwrap();

        assert!(cache.release(&entry).unwrap());
        assert!(!target.exists());
        assert!(cache.is_empty());

        // A second release of the same entry is a no-op.
        assert!(!cache.release(&entry).unwrap());
    }

    #[tokio::test]
    async fn test_retry_after_failed_fetch_restores_entry() {
        let dir = TempDir::new().unwrap();
        let cache = MaterializationCache::new();
        let entry = cache.entry("a.orc", Some(0));
        let target = dir.path().join("a.orc");

        let failed = cache
            .materialize(&entry, || async {
                Err(InventoryError::UnsupportedFormat("boom".to_string()))
            })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty());

        // A caller that was waiting on the same entry retries and succeeds.
        cache
            .materialize(&entry, || async {
                std::fs::write(&target, b"data")?;
                Ok(target.clone())
            })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&cache.get("a.orc").unwrap(), &entry));

        assert!(cache.release(&entry).unwrap());
        assert!(!target.exists());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_release_deletes_copy_of_superseded_entry() {
        let dir = TempDir::new().unwrap();
        let cache = MaterializationCache::new();
        let old = cache.entry("a.orc", Some(0));
        let target = dir.path().join("a.orc");

        let _ = cache
            .materialize(&old, || async {
                Err(InventoryError::UnsupportedFormat("boom".to_string()))
            })
            .await;
        let new = cache.entry("a.orc", Some(0));
        cache
            .materialize(&old, || async {
                std::fs::write(&target, b"data")?;
                Ok(target.clone())
            })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&cache.get("a.orc").unwrap(), &new));

        assert!(cache.release(&old).unwrap());
        assert!(!target.exists());
        assert!(Arc::ptr_eq(&cache.get("a.orc").unwrap(), &new));
        assert!(!cache.release(&old).unwrap());
    }

    #[test]
    fn test_release_ignores_newer_entry() {
        let cache = MaterializationCache::new();
        let old = cache.entry("a.orc", Some(0));
        assert!(cache.release(&old).unwrap());

        let new = cache.entry("a.orc", Some(0));
        assert!(!cache.release(&old).unwrap());
        assert!(Arc::ptr_eq(&cache.get("a.orc").unwrap(), &new));
    }
}
