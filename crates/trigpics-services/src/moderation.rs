//! Content moderation of newly created photos.
//!
//! Jobs arrive through the worker pool. The handler downloads the published
//! photo, asks a [`ContentClassifier`] for a verdict and hides the row
//! (lifecycle `M`) when the content is flagged or cannot be classified.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use trigpics_core::models::{join_url, LifecycleFlag};
use trigpics_core::AppError;
use trigpics_db::PhotoRecordStore;
use trigpics_storage::PhotoFetcher;
use trigpics_worker::{ModerationHandler, ModerationJob, ModerationOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentVerdict {
    Acceptable,
    Flagged { reason: String },
}

/// External content classification service.
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn classify(&self, image: &Bytes) -> Result<ContentVerdict, AppError>;
}

/// Classifier used when no moderation service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllClassifier;

#[async_trait]
impl ContentClassifier for AcceptAllClassifier {
    async fn classify(&self, _image: &Bytes) -> Result<ContentVerdict, AppError> {
        Ok(ContentVerdict::Acceptable)
    }
}

pub struct RecordModerationHandler {
    records: Arc<dyn PhotoRecordStore>,
    fetcher: Arc<dyn PhotoFetcher>,
    classifier: Arc<dyn ContentClassifier>,
}

impl RecordModerationHandler {
    pub fn new(
        records: Arc<dyn PhotoRecordStore>,
        fetcher: Arc<dyn PhotoFetcher>,
        classifier: Arc<dyn ContentClassifier>,
    ) -> Self {
        Self {
            records,
            fetcher,
            classifier,
        }
    }

    async fn hide(&self, photo_id: i64) -> Result<ModerationOutcome, AppError> {
        if self
            .records
            .transition(photo_id, LifecycleFlag::Active, LifecycleFlag::Moderated)
            .await?
        {
            Ok(ModerationOutcome::Flagged)
        } else {
            tracing::info!(photo_id = photo_id, "Photo left the active state during moderation");
            Ok(ModerationOutcome::Skipped)
        }
    }
}

#[async_trait]
impl ModerationHandler for RecordModerationHandler {
    async fn moderate(&self, job: &ModerationJob) -> Result<ModerationOutcome, AppError> {
        let photo = match self.records.get(job.photo_id).await? {
            Some(photo) if photo.is_active() => photo,
            Some(photo) => {
                tracing::debug!(photo_id = job.photo_id, lifecycle = %photo.lifecycle, "Skipping moderation of inactive photo");
                return Ok(ModerationOutcome::Skipped);
            }
            None => {
                tracing::debug!(photo_id = job.photo_id, "Skipping moderation of missing photo");
                return Ok(ModerationOutcome::Skipped);
            }
        };

        let base_url = self
            .records
            .server_base_url(photo.server_id)
            .await?
            .unwrap_or_default();
        let image = self
            .fetcher
            .fetch(&join_url(&base_url, &photo.main.key))
            .await?;

        match self.classifier.classify(&image).await {
            Ok(ContentVerdict::Acceptable) => Ok(ModerationOutcome::Approved),
            Ok(ContentVerdict::Flagged { reason }) => {
                tracing::warn!(photo_id = photo.id, reason = %reason, "Photo flagged by moderation");
                self.hide(photo.id).await
            }
            Err(e) => {
                tracing::warn!(error = %e, photo_id = photo.id, "Classifier failed, hiding photo");
                self.hide(photo.id).await
            }
        }
    }
}
