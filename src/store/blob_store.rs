use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use tempfile::NamedTempFile;

use crate::ql::prelude::QlError;

/// Durable key/value storage for opaque blobs
pub trait BlobStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replaces the blob stored under `key`. A reader never sees a partially written blob.
    fn set(&self, key: &str, blob: &[u8]) -> Result<()>;
}

/// One file per key inside a directory.
/// Writes go to a temporary file in the same directory, which then replaces the target atomically.
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("creating storage directory {}", dir.display()))?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    fn path_of(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
        if !valid || key.starts_with('.') {
            return Err(QlError::Storage(format!("invalid key '{key}'")).into());
        }
        Ok(self.dir.join(key))
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_of(key)?;
        match fs::read(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    fn set(&self, key: &str, blob: &[u8]) -> Result<()> {
        let path = self.path_of(key)?;
        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(blob)?;
        file.as_file().sync_all()?;
        file.persist(&path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<FxHashMap<String, Vec<u8>>>,
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self.blobs.lock().map_err(|_| QlError::Storage("lock poisoned".to_string()))?;
        Ok(blobs.get(key).cloned())
    }

    fn set(&self, key: &str, blob: &[u8]) -> Result<()> {
        let mut blobs = self.blobs.lock().map_err(|_| QlError::Storage("lock poisoned".to_string()))?;
        blobs.insert(key.to_string(), blob.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_blob_store() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileBlobStore::open(&dir.path().join("models"))?;

        assert_eq!(store.get("best_model")?, None);
        store.set("best_model", b"one")?;
        assert_eq!(store.get("best_model")?, Some(b"one".to_vec()));
        store.set("best_model", b"two")?;
        assert_eq!(store.get("best_model")?, Some(b"two".to_vec()));

        // survives reopening
        let store = FileBlobStore::open(&dir.path().join("models"))?;
        assert_eq!(store.get("best_model")?, Some(b"two".to_vec()));
        Ok(())
    }

    #[test]
    fn test_file_blob_store_rejects_path_like_keys() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileBlobStore::open(dir.path())?;
        assert!(store.set("../escape", b"x").is_err());
        assert!(store.get("").is_err());
        Ok(())
    }

    #[test]
    fn test_memory_blob_store() -> Result<()> {
        let store = MemoryBlobStore::default();
        assert_eq!(store.get("k")?, None);
        store.set("k", &[1, 2, 3])?;
        assert_eq!(store.get("k")?, Some(vec![1, 2, 3]));
        Ok(())
    }
}
