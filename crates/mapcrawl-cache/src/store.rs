//! Keyed blob storage.
//!
//! The index and every result set are independent blobs. Keys are relative,
//! `/`-separated paths such as `projects/mapCrawler/data/result/<id>.json`.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::StorageError;

pub trait BlobStore: Send + Sync {
    /// Fails with [`StorageError::NotFound`] if `key` has never been stored.
    fn load(&self, key: &str) -> impl Future<Output = Result<Vec<u8>, StorageError>> + Send;

    /// Fails with [`StorageError::AlreadyExists`] if `key` exists and
    /// `overwrite` is false.
    fn store(
        &self,
        key: &str,
        bytes: Vec<u8>,
        overwrite: bool,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Blobs as files under a root directory.
///
/// Writes go to a sibling temp file and are renamed into place, so readers
/// never see a half-written index.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let invalid = |reason| StorageError::InvalidKey {
            key: key.to_owned(),
            reason,
        };
        if key.is_empty() {
            return Err(invalid("key is empty"));
        }
        let relative = Path::new(key);
        if relative.is_absolute() || key.starts_with('/') {
            return Err(invalid("key must be relative"));
        }
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(invalid("key must not contain `.` or `..` segments"));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for FsBlobStore {
    async fn load(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_owned())
            } else {
                StorageError::Io(e)
            }
        })
    }

    async fn store(&self, key: &str, bytes: Vec<u8>, overwrite: bool) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if !overwrite && tokio::fs::try_exists(&path).await? {
            return Err(StorageError::AlreadyExists(key.to_owned()));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(key, bytes = bytes.len(), "stored blob");
        Ok(())
    }
}

/// In-process store for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `store` fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Seeds a blob directly, bypassing the failure toggle.
    pub fn insert(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.lock().insert(key.into(), bytes);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    /// Stored keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BlobStore for MemoryBlobStore {
    async fn load(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_owned()))
    }

    async fn store(&self, key: &str, bytes: Vec<u8>, overwrite: bool) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::other("writes disabled")));
        }
        let mut blobs = self.lock();
        if !overwrite && blobs.contains_key(key) {
            return Err(StorageError::AlreadyExists(key.to_owned()));
        }
        blobs.insert(key.to_owned(), bytes);
        Ok(())
    }
}

impl<T: BlobStore + ?Sized> BlobStore for &T {
    async fn load(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        (**self).load(key).await
    }

    async fn store(&self, key: &str, bytes: Vec<u8>, overwrite: bool) -> Result<(), StorageError> {
        (**self).store(key, bytes, overwrite).await
    }
}
