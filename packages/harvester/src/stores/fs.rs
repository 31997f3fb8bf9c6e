//! Filesystem artifact store.
//!
//! Keys map directly to paths under the root directory (`raw/<id>.json`,
//! `structured/<id>.json`). Writes go through a temp file and rename so
//! a crash mid-write never leaves a partial artifact at the final key.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::ArtifactStore;

/// Write-once store rooted at a local directory.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ArtifactStore for FsStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let path = self.path_for(key);
        if path.exists() {
            return Err(StoreError::AlreadyExists {
                key: key.to_string(),
            });
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(key = %key, bytes = bytes.len(), "artifact written");
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.path_for(key).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_creates_nested_dirs_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path()).unwrap();

        store.put("raw/abc.json", b"{\"url\":\"x\"}").await.unwrap();

        assert!(dir.path().join("raw/abc.json").exists());
        assert_eq!(
            store.get("raw/abc.json").await.unwrap().unwrap(),
            b"{\"url\":\"x\"}"
        );
    }

    #[tokio::test]
    async fn test_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path()).unwrap();

        store.put("structured/s.json", b"one").await.unwrap();
        let err = store.put("structured/s.json", b"two").await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path()).unwrap();

        assert!(store.get("raw/nope.json").await.unwrap().is_none());
        assert!(!store.exists("raw/nope.json").await.unwrap());
    }
}
