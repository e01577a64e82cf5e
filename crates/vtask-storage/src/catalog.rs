//! Stored-file metadata catalog.
//!
//! The catalog maps a [`StoredFileId`] to the object key holding its bytes
//! and records which subtitle file belongs to which video.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;
use vtask_models::StoredFileId;

use crate::error::{StorageError, StorageResult};

/// Metadata of one stored file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFileRecord {
    pub id: StoredFileId,
    pub owner: String,
    pub filename: String,
    pub object_key: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait FileCatalog: Send + Sync {
    async fn get(&self, id: &StoredFileId) -> StorageResult<Option<StoredFileRecord>>;

    async fn insert(&self, record: &StoredFileRecord) -> StorageResult<()>;

    /// Subtitle file associated with a video, if any.
    async fn subtitle_for_video(&self, video_id: &StoredFileId) -> StorageResult<Option<StoredFileId>>;

    async fn link_subtitle(&self, video_id: &StoredFileId, subtitle_id: &StoredFileId) -> StorageResult<()>;
}

/// Catalog kept in Redis under `{prefix}:file:{id}` and `{prefix}:video_subtitle:{video_id}`.
pub struct RedisFileCatalog {
    client: redis::Client,
    prefix: String,
}

impl RedisFileCatalog {
    pub fn new(redis_url: &str) -> StorageResult<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            prefix: "vtask".to_string(),
        })
    }

    pub fn from_env() -> StorageResult<Self> {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        Self::new(&url)
    }

    fn file_key(&self, id: &StoredFileId) -> String {
        format!("{}:file:{}", self.prefix, id)
    }

    fn subtitle_key(&self, video_id: &StoredFileId) -> String {
        format!("{}:video_subtitle:{}", self.prefix, video_id)
    }
}

#[async_trait]
impl FileCatalog for RedisFileCatalog {
    async fn get(&self, id: &StoredFileId) -> StorageResult<Option<StoredFileRecord>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(self.file_key(id)).await?;
        raw.map(|json| serde_json::from_str(&json).map_err(StorageError::from))
            .transpose()
    }

    async fn insert(&self, record: &StoredFileRecord) -> StorageResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(record)?;

        // SET NX: ids are never reused, so an existing key means a collision
        let created: bool = redis::cmd("SET")
            .arg(self.file_key(&record.id))
            .arg(payload)
            .arg("NX")
            .query_async::<Option<String>>(&mut conn)
            .await?
            .is_some();
        if !created {
            return Err(StorageError::Catalog(format!("stored file {} already exists", record.id)));
        }

        debug!("Catalogued stored file {}", record.id);
        Ok(())
    }

    async fn subtitle_for_video(&self, video_id: &StoredFileId) -> StorageResult<Option<StoredFileId>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(self.subtitle_key(video_id)).await?;
        Ok(raw.map(StoredFileId::from))
    }

    async fn link_subtitle(&self, video_id: &StoredFileId, subtitle_id: &StoredFileId) -> StorageResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set::<_, _, ()>(self.subtitle_key(video_id), subtitle_id.as_str())
            .await?;
        Ok(())
    }
}

/// In-process catalog.
#[derive(Default)]
pub struct MemoryFileCatalog {
    files: RwLock<HashMap<StoredFileId, StoredFileRecord>>,
    subtitles: RwLock<HashMap<StoredFileId, StoredFileId>>,
}

impl MemoryFileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StorageError {
    StorageError::Catalog("catalog lock poisoned".to_string())
}

#[async_trait]
impl FileCatalog for MemoryFileCatalog {
    async fn get(&self, id: &StoredFileId) -> StorageResult<Option<StoredFileRecord>> {
        Ok(self.files.read().map_err(|_| poisoned())?.get(id).cloned())
    }

    async fn insert(&self, record: &StoredFileRecord) -> StorageResult<()> {
        let mut files = self.files.write().map_err(|_| poisoned())?;
        if files.contains_key(&record.id) {
            return Err(StorageError::Catalog(format!("stored file {} already exists", record.id)));
        }
        files.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn subtitle_for_video(&self, video_id: &StoredFileId) -> StorageResult<Option<StoredFileId>> {
        Ok(self.subtitles.read().map_err(|_| poisoned())?.get(video_id).cloned())
    }

    async fn link_subtitle(&self, video_id: &StoredFileId, subtitle_id: &StoredFileId) -> StorageResult<()> {
        self.subtitles
            .write()
            .map_err(|_| poisoned())?
            .insert(video_id.clone(), subtitle_id.clone());
        Ok(())
    }
}
