//! Record-store seam used by the photo lifecycle orchestrator.

use async_trait::async_trait;
use sqlx::PgPool;
use trigpics_core::models::{LifecycleFlag, NewPhoto, PhotoAsset, PhotoMetadataUpdate};
use trigpics_core::AppError;

use super::{LogRepository, PhotoRepository, ServerRepository};

/// Everything the orchestrator needs from the database.
///
/// Lifecycle transitions return `false` when the row was not in the
/// expected state; `update_metadata` returns `None` for a row that is
/// missing or not active.
#[async_trait]
pub trait PhotoRecordStore: Send + Sync {
    async fn create_placeholder(&self, photo: &NewPhoto) -> Result<PhotoAsset, AppError>;

    async fn finalize(
        &self,
        photo_id: i64,
        main_key: &str,
        thumbnail_key: &str,
    ) -> Result<PhotoAsset, AppError>;

    async fn transition(
        &self,
        photo_id: i64,
        from: LifecycleFlag,
        to: LifecycleFlag,
    ) -> Result<bool, AppError>;

    async fn hard_delete(&self, photo_id: i64) -> Result<bool, AppError>;

    async fn update_metadata(
        &self,
        photo_id: i64,
        update: &PhotoMetadataUpdate,
    ) -> Result<Option<PhotoAsset>, AppError>;

    async fn get(&self, photo_id: i64) -> Result<Option<PhotoAsset>, AppError>;

    /// Public base URL of a photo server.
    async fn server_base_url(&self, server_id: i64) -> Result<Option<String>, AppError>;

    /// Owner of a log entry.
    async fn log_owner(&self, log_id: i64) -> Result<Option<i64>, AppError>;

    async fn soft_delete(&self, photo_id: i64) -> Result<bool, AppError> {
        self.transition(photo_id, LifecycleFlag::Active, LifecycleFlag::SoftDeleted)
            .await
    }

    async fn restore_active(&self, photo_id: i64) -> Result<bool, AppError> {
        self.transition(photo_id, LifecycleFlag::SoftDeleted, LifecycleFlag::Active)
            .await
    }
}

/// Postgres-backed [`PhotoRecordStore`].
#[derive(Clone)]
pub struct PgPhotoRecordStore {
    photos: PhotoRepository,
    servers: ServerRepository,
    logs: LogRepository,
}

impl PgPhotoRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            photos: PhotoRepository::new(pool.clone()),
            servers: ServerRepository::new(pool.clone()),
            logs: LogRepository::new(pool),
        }
    }

    pub fn photos(&self) -> &PhotoRepository {
        &self.photos
    }
}

#[async_trait]
impl PhotoRecordStore for PgPhotoRecordStore {
    async fn create_placeholder(&self, photo: &NewPhoto) -> Result<PhotoAsset, AppError> {
        self.photos.create_placeholder(photo).await
    }

    async fn finalize(
        &self,
        photo_id: i64,
        main_key: &str,
        thumbnail_key: &str,
    ) -> Result<PhotoAsset, AppError> {
        self.photos.finalize(photo_id, main_key, thumbnail_key).await
    }

    async fn transition(
        &self,
        photo_id: i64,
        from: LifecycleFlag,
        to: LifecycleFlag,
    ) -> Result<bool, AppError> {
        self.photos.transition(photo_id, from, to).await
    }

    async fn hard_delete(&self, photo_id: i64) -> Result<bool, AppError> {
        self.photos.hard_delete(photo_id).await
    }

    async fn update_metadata(
        &self,
        photo_id: i64,
        update: &PhotoMetadataUpdate,
    ) -> Result<Option<PhotoAsset>, AppError> {
        self.photos.update_metadata(photo_id, update).await
    }

    async fn get(&self, photo_id: i64) -> Result<Option<PhotoAsset>, AppError> {
        self.photos.get_by_id(photo_id).await
    }

    async fn server_base_url(&self, server_id: i64) -> Result<Option<String>, AppError> {
        Ok(self.servers.get_by_id(server_id).await?.map(|s| s.url))
    }

    async fn log_owner(&self, log_id: i64) -> Result<Option<i64>, AppError> {
        self.logs.owner_of(log_id).await
    }
}
