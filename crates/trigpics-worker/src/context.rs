//! Moderation handler trait
//!
//! The services layer implements this for the photo record store; the
//! worker pool calls `moderate` for every dequeued job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use trigpics_core::AppError;

/// One queued moderation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModerationJob {
    pub photo_id: i64,
    pub enqueued_at: DateTime<Utc>,
}

impl ModerationJob {
    pub fn new(photo_id: i64) -> Self {
        Self {
            photo_id,
            enqueued_at: Utc::now(),
        }
    }
}

/// What a handler did with a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationOutcome {
    Approved,
    /// Photo was hidden from readers
    Flagged,
    /// Photo no longer needs moderation (gone, deleted or already hidden)
    Skipped,
}

#[async_trait]
pub trait ModerationHandler: Send + Sync {
    async fn moderate(&self, job: &ModerationJob) -> Result<ModerationOutcome, AppError>;
}
