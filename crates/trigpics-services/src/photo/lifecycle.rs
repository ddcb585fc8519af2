//! Photo lifecycle orchestrator.
//!
//! Create and Rotate span three systems (codec, object store, database) and
//! run as sagas, see [`super::saga`]. They execute on a detached task so a
//! dropped caller cannot abandon a flow between a write and its
//! compensation. Rotate, Update and Delete hold the per-photo lock for their
//! whole duration.

use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use trigpics_core::models::{
    join_url, Actor, NewPhoto, PhotoAsset, PhotoMetadataUpdate, PhotoSubmission, PhotoView,
    Provenance,
};
use trigpics_core::AppError;
use trigpics_db::PhotoRecordStore;
use trigpics_processing::{PhotoCodec, RotationAngle};
use trigpics_storage::{
    GatewayError, ObjectStoreGateway, ObjectVisibility, PhotoFetcher, PhotoObjectKeys,
};
use trigpics_worker::ModerationQueue;

use super::locks::PhotoLocks;
use super::saga::{CreateState, Rollback, RotateState, Saga};

/// Revision keys tried before a rotation gives up
pub const MAX_REVISION_ATTEMPTS: usize = 8;

#[derive(Clone)]
pub struct PhotoLifecycle {
    pub(crate) records: Arc<dyn PhotoRecordStore>,
    pub(crate) gateway: ObjectStoreGateway,
    pub(crate) fetcher: Arc<dyn PhotoFetcher>,
    pub(crate) codec: PhotoCodec,
    moderation: Arc<dyn ModerationQueue>,
    locks: Arc<PhotoLocks>,
    server_id: i64,
}

impl PhotoLifecycle {
    /// `server_id` is the photo server new and rotated photos are stored on.
    pub fn new(
        records: Arc<dyn PhotoRecordStore>,
        gateway: ObjectStoreGateway,
        fetcher: Arc<dyn PhotoFetcher>,
        codec: PhotoCodec,
        moderation: Arc<dyn ModerationQueue>,
        server_id: i64,
    ) -> Self {
        Self {
            records,
            gateway,
            fetcher,
            codec,
            moderation,
            locks: Arc::new(PhotoLocks::new()),
            server_id,
        }
    }

    pub fn locks(&self) -> &Arc<PhotoLocks> {
        &self.locks
    }

    /// Upload a new photo to a log.
    ///
    /// Invalid submissions and images are rejected before any write. On
    /// success a moderation job is queued; queueing problems are only logged.
    pub async fn create_photo(
        &self,
        actor: Actor,
        submission: PhotoSubmission,
        image: Bytes,
    ) -> Result<PhotoView, AppError> {
        let this = self.clone();
        detached(async move { this.run_create(actor, submission, image).await }).await
    }

    /// Replace a photo by a rotated revision of itself.
    ///
    /// The angle is checked before anything else; only 90, 180 and 270 are
    /// accepted. The original row is soft-deleted once the revision is live.
    pub async fn rotate_photo(
        &self,
        actor: Actor,
        photo_id: i64,
        angle: i32,
    ) -> Result<PhotoView, AppError> {
        let angle = RotationAngle::try_from(angle)?;
        let this = self.clone();
        detached(async move { this.run_rotate(actor, photo_id, angle).await }).await
    }

    /// Overwrite caption, description and licence of an active photo.
    #[tracing::instrument(skip(self, actor, update), fields(user_id = actor.user_id))]
    pub async fn update_photo_metadata(
        &self,
        actor: Actor,
        photo_id: i64,
        update: PhotoMetadataUpdate,
    ) -> Result<PhotoView, AppError> {
        let update = update.normalized()?;
        let _guard = self.locks.acquire(photo_id).await;

        let current = self.load_active(photo_id).await?;
        let owner_id = self.owner_of_log(current.log_id).await?;
        authorize(&actor, owner_id, photo_id)?;
        let base_url = self.base_url(current.server_id).await?;

        let updated = self
            .records
            .update_metadata(photo_id, &update)
            .await?
            .ok_or_else(|| not_found(photo_id))?;

        tracing::info!(
            photo_id = photo_id,
            caption = update.caption.is_some(),
            text_desc = update.text_desc.is_some(),
            license = ?update.license,
            "Photo metadata updated"
        );

        Ok(PhotoView::from_asset(&updated, owner_id, &base_url))
    }

    /// Soft-delete an active photo. Its objects stay in the store.
    #[tracing::instrument(skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn delete_photo(&self, actor: Actor, photo_id: i64) -> Result<(), AppError> {
        let _guard = self.locks.acquire(photo_id).await;

        let current = self.load_active(photo_id).await?;
        let owner_id = self.owner_of_log(current.log_id).await?;
        authorize(&actor, owner_id, photo_id)?;

        if !self.records.soft_delete(photo_id).await? {
            return Err(not_found(photo_id));
        }

        tracing::info!(
            photo_id = photo_id,
            log_id = current.log_id,
            main_key = %current.main.key,
            "Photo deleted"
        );
        Ok(())
    }

    /// Read an active photo.
    pub async fn get_photo(&self, photo_id: i64) -> Result<PhotoView, AppError> {
        let photo = self.load_active(photo_id).await?;
        let owner_id = self.owner_of_log(photo.log_id).await?;
        let base_url = self.base_url(photo.server_id).await?;
        Ok(PhotoView::from_asset(&photo, owner_id, &base_url))
    }

    async fn run_create(
        &self,
        actor: Actor,
        submission: PhotoSubmission,
        image: Bytes,
    ) -> Result<PhotoView, AppError> {
        let rollback = Rollback {
            records: self.records.as_ref(),
            gateway: &self.gateway,
        };
        let mut saga = Saga::new(CreateState::Validating);

        let submission = saga.checked(submission.normalized(), &rollback).await?;
        let upload = image.clone();
        let validated = self.run_blocking(move |codec| codec.validate(&upload)).await;
        saga.checked(validated, &rollback).await?;
        let owner_id = saga
            .checked(self.owner_of_log(submission.log_id).await, &rollback)
            .await?;
        saga.checked(authorize_log(&actor, owner_id, submission.log_id), &rollback)
            .await?;
        let base_url = saga
            .checked(self.base_url(self.server_id).await, &rollback)
            .await?;

        saga.advance();
        let processed = self.run_blocking(move |codec| codec.process(&image)).await;
        let processed = saga.checked(processed, &rollback).await?;

        saga.advance();
        let new_photo = NewPhoto {
            log_id: submission.log_id,
            server_id: self.server_id,
            photo_type: submission.photo_type,
            main: processed.main_dims,
            thumbnail: processed.thumbnail_dims,
            caption: submission.caption,
            description: submission.text_desc,
            ip_addr: submission.client_ip.unwrap_or_default(),
            visibility: submission.license,
            provenance: Provenance::Upload,
        };
        let placeholder = saga
            .checked(self.records.create_placeholder(&new_photo).await, &rollback)
            .await?;
        saga.artifacts_mut().row_id = Some(placeholder.id);

        saga.advance();
        let keys = PhotoObjectKeys::for_photo(placeholder.id);
        let uploaded = self
            .gateway
            .put_pair(
                &keys,
                processed.main,
                processed.thumbnail,
                ObjectVisibility::PublicRead,
            )
            .await
            .map_err(AppError::from);
        saga.checked(uploaded, &rollback).await?;
        saga.artifacts_mut().keys = Some(keys.clone());

        saga.advance();
        let photo = saga
            .checked(
                self.records
                    .finalize(placeholder.id, &keys.main, &keys.thumbnail)
                    .await,
                &rollback,
            )
            .await?;
        saga.finish();

        tracing::info!(
            photo_id = photo.id,
            log_id = photo.log_id,
            user_id = actor.user_id,
            main_key = %keys.main,
            width = photo.main.width,
            height = photo.main.height,
            "Photo created"
        );

        self.enqueue_moderation(photo.id);
        Ok(PhotoView::from_asset(&photo, owner_id, &base_url))
    }

    async fn run_rotate(
        &self,
        actor: Actor,
        photo_id: i64,
        angle: RotationAngle,
    ) -> Result<PhotoView, AppError> {
        let _guard = self.locks.acquire(photo_id).await;
        let rollback = Rollback {
            records: self.records.as_ref(),
            gateway: &self.gateway,
        };
        let mut saga = Saga::new(RotateState::Loading);

        let original = saga.checked(self.load_active(photo_id).await, &rollback).await?;
        saga.artifacts_mut().original_id = Some(original.id);
        let owner_id = saga
            .checked(self.owner_of_log(original.log_id).await, &rollback)
            .await?;
        saga.checked(authorize(&actor, owner_id, photo_id), &rollback)
            .await?;
        let source_base = saga
            .checked(self.base_url(original.server_id).await, &rollback)
            .await?;
        let target_base = if original.server_id == self.server_id {
            source_base.clone()
        } else {
            saga.checked(self.base_url(self.server_id).await, &rollback)
                .await?
        };

        let source_url = join_url(&source_base, &original.main.key);
        let fetched = self.fetcher.fetch(&source_url).await.map_err(AppError::from);
        let source = saga.checked(fetched, &rollback).await?;

        saga.advance();
        let transformed = self
            .run_blocking(move |codec| {
                codec.validate(&source).map_err(AppError::from)?;
                let rotated = codec.rotate(&source, angle)?;
                codec.process(&rotated).map_err(AppError::from)
            })
            .await;
        let processed = saga.checked(transformed, &rollback).await?;

        saga.advance();
        let mut revision = original.revision_of(processed.main_dims, processed.thumbnail_dims);
        revision.server_id = self.server_id;
        let placeholder = saga
            .checked(self.records.create_placeholder(&revision).await, &rollback)
            .await?;
        saga.artifacts_mut().row_id = Some(placeholder.id);

        saga.advance();
        let uploaded = self
            .upload_revision(&original, processed.main, processed.thumbnail)
            .await;
        let keys = saga.checked(uploaded, &rollback).await?;
        saga.artifacts_mut().keys = Some(keys.clone());

        saga.advance();
        let photo = saga
            .checked(
                self.records
                    .finalize(placeholder.id, &keys.main, &keys.thumbnail)
                    .await,
                &rollback,
            )
            .await?;

        saga.advance();
        match self.records.soft_delete(original.id).await {
            Ok(true) => {}
            Ok(false) => {
                let cause =
                    AppError::NotFound(format!("Photo {} is no longer active", original.id));
                return Err(saga.fail(cause, &rollback).await);
            }
            Err(e) => {
                saga.artifacts_mut().original_touched = true;
                return Err(saga.fail(e, &rollback).await);
            }
        }
        saga.finish();

        tracing::info!(
            photo_id = photo.id,
            original_id = original.id,
            angle = angle.degrees(),
            main_key = %keys.main,
            width = photo.main.width,
            height = photo.main.height,
            "Photo rotated"
        );

        Ok(PhotoView::from_asset(&photo, owner_id, &target_base))
    }

    /// Write a rotated pair under the first revision keys of `original`
    /// that nobody holds yet, returning the keys written.
    async fn upload_revision(
        &self,
        original: &PhotoAsset,
        main: Bytes,
        thumbnail: Bytes,
    ) -> Result<PhotoObjectKeys, AppError> {
        let mut keys = PhotoObjectKeys::next_revision_of(&original.main.key, &original.thumbnail.key);
        for _ in 0..MAX_REVISION_ATTEMPTS {
            match self
                .gateway
                .put_pair(
                    &keys,
                    main.clone(),
                    thumbnail.clone(),
                    ObjectVisibility::PublicRead,
                )
                .await
            {
                Ok(()) => return Ok(keys),
                Err(GatewayError::KeyTaken { key }) => {
                    tracing::info!(
                        photo_id = original.id,
                        key = %key,
                        "Revision key already taken, trying the next one"
                    );
                    keys = PhotoObjectKeys::next_revision_of(&keys.main, &keys.thumbnail);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Storage(format!(
            "No free revision key for photo {} after {} attempts",
            original.id, MAX_REVISION_ATTEMPTS
        )))
    }

    /// Active, finalized row or NotFound.
    pub(crate) async fn load_active(&self, photo_id: i64) -> Result<PhotoAsset, AppError> {
        match self.records.get(photo_id).await? {
            Some(photo) if photo.is_active() && !photo.is_placeholder() => Ok(photo),
            _ => Err(not_found(photo_id)),
        }
    }

    async fn owner_of_log(&self, log_id: i64) -> Result<i64, AppError> {
        self.records
            .log_owner(log_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Log {} not found", log_id)))
    }

    pub(crate) async fn base_url(&self, server_id: i64) -> Result<String, AppError> {
        match self.records.server_base_url(server_id).await? {
            Some(url) => Ok(url),
            None => {
                tracing::warn!(server_id = server_id, "Photo server not found, using bare keys");
                Ok(String::new())
            }
        }
    }

    async fn run_blocking<T, E, F>(&self, task: F) -> Result<T, AppError>
    where
        F: FnOnce(&PhotoCodec) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<AppError> + Send + 'static,
    {
        let codec = self.codec.clone();
        tokio::task::spawn_blocking(move || task(&codec))
            .await
            .map_err(|e| AppError::Internal(format!("Image task failed: {}", e)))?
            .map_err(Into::into)
    }

    fn enqueue_moderation(&self, photo_id: i64) {
        match self.moderation.enqueue(photo_id) {
            Ok(()) => tracing::debug!(photo_id = photo_id, "Moderation job queued"),
            Err(e) => tracing::warn!(error = %e, photo_id = photo_id, "Failed to queue moderation job"),
        }
    }
}

/// Run a flow on its own task so it completes even if the caller goes away.
async fn detached<T, F>(flow: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(flow)
        .await
        .map_err(|e| AppError::Internal(format!("Photo flow task failed: {}", e)))?
}

fn not_found(photo_id: i64) -> AppError {
    AppError::NotFound(format!("Photo {} not found", photo_id))
}

fn authorize(actor: &Actor, owner_id: i64, photo_id: i64) -> Result<(), AppError> {
    if actor.may_modify(owner_id) {
        return Ok(());
    }
    tracing::debug!(photo_id = photo_id, user_id = actor.user_id, owner_id = owner_id, "Photo change refused");
    Err(AppError::Forbidden(format!(
        "Not allowed to modify photo {}",
        photo_id
    )))
}

fn authorize_log(actor: &Actor, owner_id: i64, log_id: i64) -> Result<(), AppError> {
    if actor.may_modify(owner_id) {
        return Ok(());
    }
    tracing::debug!(log_id = log_id, user_id = actor.user_id, owner_id = owner_id, "Photo upload refused");
    Err(AppError::Forbidden(format!(
        "Not allowed to add photos to log {}",
        log_id
    )))
}
