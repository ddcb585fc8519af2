//! Wiring of storage, records, codec, moderation and the lifecycle.

use crate::constants::MULTIPART_OVERHEAD_BYTES;
use crate::state::AppState;
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use trigpics_core::Config;
use trigpics_services::{
    create_storage, AcceptAllClassifier, CodecSettings, HttpPhotoFetcher, ModerationPoolConfig,
    ModerationWorkerPool, ObjectStoreGateway, PgPhotoRecordStore, PhotoCodec, PhotoFetcher,
    PhotoLifecycle, PhotoRecordStore, RecordModerationHandler, StorageBackend,
};

pub struct Services {
    pub state: Arc<AppState>,
    pub moderation: Arc<ModerationWorkerPool>,
}

pub async fn initialize_services(config: &Config, pool: PgPool) -> Result<Services> {
    let storage = create_storage(config)
        .await
        .context("Failed to initialize photo storage")?;
    let gateway = ObjectStoreGateway::new(
        storage,
        Duration::from_secs(config.storage_timeout_secs()),
        config.cache_control().to_string(),
    );

    let records: Arc<dyn PhotoRecordStore> = Arc::new(PgPhotoRecordStore::new(pool.clone()));
    let fetcher: Arc<dyn PhotoFetcher> = Arc::new(
        HttpPhotoFetcher::new(
            Duration::from_secs(config.fetch_timeout_secs()),
            config.max_image_size_bytes(),
        )
        .context("Failed to build photo fetcher")?,
    );

    let handler = Arc::new(RecordModerationHandler::new(
        records.clone(),
        fetcher.clone(),
        Arc::new(AcceptAllClassifier),
    ));
    let moderation = Arc::new(ModerationWorkerPool::new(
        ModerationPoolConfig::from_config(config),
        handler,
    ));

    let lifecycle = PhotoLifecycle::new(
        records,
        gateway,
        fetcher,
        PhotoCodec::new(CodecSettings::from_config(config)),
        moderation.clone(),
        config.photos_server_id(),
    );

    let local_photos_dir = match config.storage_backend() {
        StorageBackend::Local => Some(PathBuf::from(config.local_storage_path())),
        StorageBackend::S3 => None,
    };

    tracing::info!(
        photos_server_id = config.photos_server_id(),
        max_image_size_bytes = config.max_image_size_bytes(),
        moderation_workers = config.moderation_workers(),
        "Photo services initialized"
    );

    let state = Arc::new(AppState {
        lifecycle,
        db_pool: Some(pool),
        max_upload_bytes: config.max_image_size_bytes() + MULTIPART_OVERHEAD_BYTES,
        trusted_proxy_count: config.trusted_proxy_count(),
        local_photos_dir,
    });

    Ok(Services { state, moderation })
}
