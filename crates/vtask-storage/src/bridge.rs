//! Byte-level persistence of stored files.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use vtask_models::StoredFileId;

use crate::catalog::{FileCatalog, StoredFileRecord};
use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// Metadata supplied by a job for a file it is about to persist.
#[derive(Debug, Clone)]
pub struct NewStoredFile {
    pub owner: String,
    pub filename: String,
    pub content_type: String,
}

impl NewStoredFile {
    pub fn new(owner: impl Into<String>, filename: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            filename: filename.into(),
            content_type: content_type.into(),
        }
    }
}

/// Loads and saves stored files: bytes in the object store, metadata in the catalog.
#[derive(Clone)]
pub struct FileBridge {
    store: Arc<dyn ObjectStore>,
    catalog: Arc<dyn FileCatalog>,
}

impl FileBridge {
    pub fn new(store: Arc<dyn ObjectStore>, catalog: Arc<dyn FileCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Object key for a new file.
    pub fn object_key(owner: &str, id: &StoredFileId, filename: &str) -> String {
        let safe_name: String = filename
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
            .collect();
        let safe_owner: String = owner
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') { c } else { '_' })
            .collect();
        format!("files/{}/{}/{}", safe_owner, id, safe_name)
    }

    fn check_id(id: &StoredFileId) -> StorageResult<()> {
        if id.is_well_formed() {
            Ok(())
        } else {
            Err(StorageError::InvalidId(id.to_string()))
        }
    }

    /// Catalog record of `id`.
    pub async fn record(&self, id: &StoredFileId) -> StorageResult<StoredFileRecord> {
        Self::check_id(id)?;
        self.catalog
            .get(id)
            .await?
            .ok_or_else(|| StorageError::not_found(id.as_str()))
    }

    /// Bytes of the stored file `id`.
    pub async fn load(&self, id: &StoredFileId) -> StorageResult<Vec<u8>> {
        let record = self.record(id).await?;
        self.store.get(&record.object_key).await
    }

    /// Persist `data` under the fresh id `id`.
    ///
    /// The catalog refuses an id it already knows, so existing content is never
    /// replaced. If cataloguing fails the uploaded object is removed again.
    pub async fn save(&self, id: &StoredFileId, meta: NewStoredFile, data: Vec<u8>) -> StorageResult<()> {
        Self::check_id(id)?;
        if self.catalog.get(id).await?.is_some() {
            return Err(StorageError::Catalog(format!("stored file {} already exists", id)));
        }

        let object_key = Self::object_key(&meta.owner, id, &meta.filename);
        let size = data.len();
        self.store.put(&object_key, data, &meta.content_type).await?;

        let record = StoredFileRecord {
            id: id.clone(),
            owner: meta.owner,
            filename: meta.filename,
            object_key: object_key.clone(),
            content_type: meta.content_type,
            created_at: Utc::now(),
        };

        if let Err(e) = self.catalog.insert(&record).await {
            if let Err(cleanup) = self.store.delete(&object_key).await {
                warn!("Failed to remove orphaned object {}: {}", object_key, cleanup);
            }
            return Err(e);
        }

        info!(file_id = %id, bytes = size, "Saved stored file");
        Ok(())
    }

    /// Subtitle file associated with the video `video_id`, if any.
    pub async fn subtitle_for_video(&self, video_id: &StoredFileId) -> StorageResult<Option<StoredFileId>> {
        Self::check_id(video_id)?;
        self.catalog.subtitle_for_video(video_id).await
    }

    /// Record that `subtitle_id` belongs to `video_id`.
    pub async fn link_subtitle(&self, video_id: &StoredFileId, subtitle_id: &StoredFileId) -> StorageResult<()> {
        Self::check_id(video_id)?;
        Self::check_id(subtitle_id)?;
        self.catalog.link_subtitle(video_id, subtitle_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryFileCatalog;
    use crate::store::MemoryObjectStore;

    fn bridge() -> (FileBridge, Arc<MemoryObjectStore>, Arc<MemoryFileCatalog>) {
        let store = Arc::new(MemoryObjectStore::new());
        let catalog = Arc::new(MemoryFileCatalog::new());
        (FileBridge::new(store.clone(), catalog.clone()), store, catalog)
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (bridge, store, _) = bridge();
        let id = StoredFileId::new();
        bridge
            .save(&id, NewStoredFile::new("user-1", "clip.mp4", "video/mp4"), b"bytes".to_vec())
            .await
            .unwrap();

        assert_eq!(bridge.load(&id).await.unwrap(), b"bytes");
        let record = bridge.record(&id).await.unwrap();
        assert_eq!(record.object_key, format!("files/user-1/{}/clip.mp4", id));
        assert_eq!(store.content_type(&record.object_key).as_deref(), Some("video/mp4"));
    }

    #[tokio::test]
    async fn test_existing_id_is_never_overwritten() {
        let (bridge, _, _) = bridge();
        let id = StoredFileId::new();
        let meta = NewStoredFile::new("u", "a.mp4", "video/mp4");
        bridge.save(&id, meta.clone(), b"first".to_vec()).await.unwrap();

        assert!(bridge.save(&id, meta, b"second".to_vec()).await.is_err());
        assert_eq!(bridge.load(&id).await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids() {
        let (bridge, _, _) = bridge();
        let missing = bridge.load(&StoredFileId::from("nope")).await.unwrap_err();
        assert!(matches!(missing, StorageError::NotFound(_)));
        assert!(missing.is_validation());

        let malformed = bridge.load(&StoredFileId::from("../etc/passwd")).await.unwrap_err();
        assert!(matches!(malformed, StorageError::InvalidId(_)));
    }

    #[tokio::test]
    async fn test_subtitle_association() {
        let (bridge, _, _) = bridge();
        let video = StoredFileId::from("video-1");
        assert_eq!(bridge.subtitle_for_video(&video).await.unwrap(), None);

        bridge.link_subtitle(&video, &StoredFileId::from("subs-1")).await.unwrap();
        assert_eq!(
            bridge.subtitle_for_video(&video).await.unwrap(),
            Some(StoredFileId::from("subs-1"))
        );
    }

    #[test]
    fn test_object_key_is_sanitised() {
        let id = StoredFileId::from("abc");
        assert_eq!(FileBridge::object_key("a/b", &id, "my clip?.mp4"), "files/a_b/abc/my_clip_.mp4");
    }
}
