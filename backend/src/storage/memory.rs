use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::RwLock;

use super::{ObjectStore, StorageError};

/// In-process store; contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        self.files
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    #[tracing::instrument(skip(self, data), name = "MemoryStore::put", fields(size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        self.files.write().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.files
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }
}
