//! In-memory artifact store for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::ArtifactStore;

/// Non-durable write-once store backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// All keys, for test assertions.
    pub async fn keys(&self) -> Vec<String> {
        self.blobs.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let mut blobs = self.blobs.write().await;
        if blobs.contains_key(key) {
            return Err(StoreError::AlreadyExists {
                key: key.to_string(),
            });
        }
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.blobs.read().await.contains_key(key))
    }
}
