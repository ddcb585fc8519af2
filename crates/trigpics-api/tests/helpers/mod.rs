//! Test application: the real router over local disk storage and an
//! in-memory record store.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use bytes::Bytes;
use chrono::Utc;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use trigpics_api::{setup_routes, AppState};
use trigpics_core::models::{
    ImageAssetMeta, LifecycleFlag, NewPhoto, PhotoAsset, PhotoMetadataUpdate,
};
use trigpics_core::AppError;
use trigpics_services::{ObjectStoreGateway, PhotoCodec, PhotoLifecycle, PhotoRecordStore};
use trigpics_storage::{FetchError, LocalStorage, PhotoFetcher, Storage};
use trigpics_worker::{EnqueueError, ModerationQueue};

pub const SERVER_ID: i64 = 1;
pub const BASE_URL: &str = "http://photos.test/photos";
pub const LOG_ID: i64 = 100;
pub const OWNER: &str = "10";
pub const STRANGER: &str = "11";

pub fn jpeg(width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 64])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Jpeg)
        .unwrap();
    Bytes::from(out.into_inner())
}

pub fn upload_form(image: Bytes, caption: &str) -> MultipartForm {
    MultipartForm::new()
        .add_part(
            "file",
            Part::bytes(image)
                .file_name("pillar.jpg")
                .mime_type("image/jpeg"),
        )
        .add_text("caption", caption.to_string())
        .add_text("text_desc", "Looking south")
        .add_text("type", "T")
        .add_text("license", "Y")
}

pub struct MemoryRecordStore {
    pub rows: Mutex<BTreeMap<i64, PhotoAsset>>,
    servers: HashMap<i64, String>,
    logs: HashMap<i64, i64>,
    next_id: AtomicI64,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            servers: HashMap::from([(SERVER_ID, BASE_URL.to_string())]),
            logs: HashMap::from([(LOG_ID, 10)]),
            next_id: AtomicI64::new(1),
        }
    }
}

impl MemoryRecordStore {
    pub fn row(&self, photo_id: i64) -> Option<PhotoAsset> {
        self.rows.lock().unwrap().get(&photo_id).cloned()
    }

    fn flip(&self, photo_id: i64, from: LifecycleFlag, to: LifecycleFlag) -> bool {
        match self.rows.lock().unwrap().get_mut(&photo_id) {
            Some(row) if row.lifecycle == from => {
                row.lifecycle = to;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl PhotoRecordStore for MemoryRecordStore {
    async fn create_placeholder(&self, photo: &NewPhoto) -> Result<PhotoAsset, AppError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let asset = PhotoAsset {
            id,
            log_id: photo.log_id,
            server_id: photo.server_id,
            photo_type: photo.photo_type,
            main: ImageAssetMeta::new("", photo.main),
            thumbnail: ImageAssetMeta::new("", photo.thumbnail),
            caption: photo.caption.clone(),
            description: photo.description.clone(),
            ip_addr: photo.ip_addr.clone(),
            visibility: photo.visibility,
            lifecycle: LifecycleFlag::Active,
            provenance: photo.provenance,
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().insert(id, asset.clone());
        Ok(asset)
    }

    async fn finalize(
        &self,
        photo_id: i64,
        main_key: &str,
        thumbnail_key: &str,
    ) -> Result<PhotoAsset, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(&photo_id)
            .ok_or_else(|| AppError::NotFound(format!("Photo {} not found", photo_id)))?;
        row.main.key = main_key.to_string();
        row.thumbnail.key = thumbnail_key.to_string();
        Ok(row.clone())
    }

    async fn transition(
        &self,
        photo_id: i64,
        from: LifecycleFlag,
        to: LifecycleFlag,
    ) -> Result<bool, AppError> {
        Ok(self.flip(photo_id, from, to))
    }

    async fn hard_delete(&self, photo_id: i64) -> Result<bool, AppError> {
        Ok(self.rows.lock().unwrap().remove(&photo_id).is_some())
    }

    async fn update_metadata(
        &self,
        photo_id: i64,
        update: &PhotoMetadataUpdate,
    ) -> Result<Option<PhotoAsset>, AppError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&photo_id) {
            Some(row) if row.is_active() => {
                if let Some(caption) = &update.caption {
                    row.caption = caption.clone();
                }
                if let Some(text_desc) = &update.text_desc {
                    row.description = text_desc.clone();
                }
                if let Some(license) = update.license {
                    row.visibility = license;
                }
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn get(&self, photo_id: i64) -> Result<Option<PhotoAsset>, AppError> {
        Ok(self.row(photo_id))
    }

    async fn server_base_url(&self, server_id: i64) -> Result<Option<String>, AppError> {
        Ok(self.servers.get(&server_id).cloned())
    }

    async fn log_owner(&self, log_id: i64) -> Result<Option<i64>, AppError> {
        Ok(self.logs.get(&log_id).copied())
    }

    async fn soft_delete(&self, photo_id: i64) -> Result<bool, AppError> {
        Ok(self.flip(photo_id, LifecycleFlag::Active, LifecycleFlag::SoftDeleted))
    }

    async fn restore_active(&self, photo_id: i64) -> Result<bool, AppError> {
        Ok(self.flip(photo_id, LifecycleFlag::SoftDeleted, LifecycleFlag::Active))
    }
}

/// Resolves public URLs under [`BASE_URL`] against the local storage root.
pub struct DiskFetcher {
    storage: Arc<LocalStorage>,
}

#[async_trait]
impl PhotoFetcher for DiskFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let missing = || FetchError::Status {
            url: url.to_string(),
            status: 404,
        };
        let key = url
            .strip_prefix(BASE_URL)
            .map(|k| k.trim_start_matches('/'))
            .ok_or_else(missing)?;
        self.storage.get(key).await.map_err(|_| missing())
    }
}

#[derive(Default)]
pub struct RecordingQueue {
    pub jobs: Mutex<Vec<i64>>,
}

impl ModerationQueue for RecordingQueue {
    fn enqueue(&self, photo_id: i64) -> Result<(), EnqueueError> {
        self.jobs.lock().unwrap().push(photo_id);
        Ok(())
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub records: Arc<MemoryRecordStore>,
    pub queue: Arc<RecordingQueue>,
    pub dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
        let records = Arc::new(MemoryRecordStore::default());
        let queue = Arc::new(RecordingQueue::default());

        let gateway = ObjectStoreGateway::new(
            storage.clone(),
            Duration::from_secs(5),
            "public, max-age=60".to_string(),
        );
        let lifecycle = PhotoLifecycle::new(
            records.clone(),
            gateway,
            Arc::new(DiskFetcher { storage }),
            PhotoCodec::default(),
            queue.clone(),
            SERVER_ID,
        );

        let state = Arc::new(AppState {
            lifecycle,
            db_pool: None,
            max_upload_bytes: 8 * 1024 * 1024,
            trusted_proxy_count: 0,
            local_photos_dir: Some(dir.path().to_path_buf()),
        });

        let server = TestServer::new(setup_routes(state).into_make_service())
            .expect("Failed to create test server");

        Self {
            server,
            records,
            queue,
            dir,
        }
    }

    /// Upload a photo as the log owner and return the response body.
    pub async fn upload(&self, width: u32, height: u32) -> serde_json::Value {
        let response = self
            .server
            .post(&format!("/api/v1/photos?log_id={}", LOG_ID))
            .add_header("x-user-id", OWNER)
            .multipart(upload_form(jpeg(width, height), "Pillar"))
            .await;
        assert_eq!(response.status_code(), 201, "{}", response.text());
        response.json()
    }
}
