//! Object storage abstraction.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{StorageError, StorageResult};

/// Blob storage keyed by object key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()>;

    /// Fails with [`StorageError::NotFound`] for a missing key.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// In-process object store.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .ok()
            .and_then(|o| o.get(key).map(|(_, ct)| ct.clone()))
    }
}

fn poisoned() -> StorageError {
    StorageError::AwsSdk("object table lock poisoned".to_string())
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        self.objects
            .write()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), (data, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .read()
            .map_err(|_| poisoned())?
            .get(key)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.write().map_err(|_| poisoned())?.remove(key);
        Ok(())
    }
}
