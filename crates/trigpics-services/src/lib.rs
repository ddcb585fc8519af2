//! Trigpics Services Layer
//!
//! Hosts the photo lifecycle orchestrator and the moderation handler, and
//! re-exports what the API needs from storage, processing and the worker so
//! the API crate depends on a single service facade.

pub mod moderation;
pub mod photo;

pub use moderation::{AcceptAllClassifier, ContentClassifier, ContentVerdict, RecordModerationHandler};
pub use photo::{
    Compensation, CreateState, PhotoLifecycle, PhotoLockGuard, PhotoLocks, RotateState, SagaState,
};
pub use trigpics_db::{PgPhotoRecordStore, PhotoRecordStore};
pub use trigpics_processing::{CodecSettings, PhotoCodec, RotationAngle};
pub use trigpics_storage::{
    create_storage, HttpPhotoFetcher, ObjectStoreGateway, PhotoFetcher, Storage, StorageBackend,
};
pub use trigpics_worker::{ModerationPoolConfig, ModerationQueue, ModerationWorkerPool};
