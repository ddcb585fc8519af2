//! In-memory collaborators for orchestrator tests.
//!
//! Every fake counts its calls and supports failure injection so tests can
//! drive each saga step into its failure path.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;
use trigpics_core::models::{
    Actor, ImageAssetMeta, LifecycleFlag, NewPhoto, PhotoAsset, PhotoMetadataUpdate,
    PhotoSubmission, PhotoType, Visibility,
};
use trigpics_core::AppError;
use trigpics_services::{
    CodecSettings, ObjectStoreGateway, PhotoCodec, PhotoLifecycle, PhotoRecordStore,
};
use trigpics_storage::{
    FetchError, ObjectWriteOptions, PhotoFetcher, Storage, StorageBackend, StorageError,
    StorageResult,
};
use trigpics_worker::{EnqueueError, ModerationQueue};

pub const SERVER_ID: i64 = 1;
pub const BASE_URL: &str = "https://photos.test/";
pub const LOG_ID: i64 = 100;
pub const OWNER: i64 = 10;

pub fn owner() -> Actor {
    Actor::new(OWNER, false)
}

pub fn stranger() -> Actor {
    Actor::new(OWNER + 1, false)
}

pub fn admin() -> Actor {
    Actor::new(1, true)
}

/// JPEG with a horizontal gradient so encoders have something to chew on.
pub fn jpeg(width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Jpeg)
        .unwrap();
    Bytes::from(out.into_inner())
}

pub fn submission(caption: &str) -> PhotoSubmission {
    PhotoSubmission {
        log_id: LOG_ID,
        caption: caption.to_string(),
        text_desc: "From the north".to_string(),
        photo_type: PhotoType::Trigpoint,
        license: Visibility::PublicDomain,
        client_ip: Some("192.0.2.1".to_string()),
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<HashMap<String, Bytes>>,
    pub fail_put: Mutex<HashSet<String>>,
    pub fail_delete: Mutex<HashSet<String>>,
    pub calls: AtomicUsize,
}

impl MemoryStorage {
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn fail_put_of(&self, key: &str) {
        self.fail_put.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_delete_of(&self, key: &str) {
        self.fail_delete.lock().unwrap().insert(key.to_string());
    }

    pub fn remove(&self, key: &str) {
        self.objects.lock().unwrap().remove(key);
    }

    pub fn insert(&self, key: &str, data: Bytes) {
        self.objects.lock().unwrap().insert(key.to_string(), data);
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, key: &str, data: Bytes, options: &ObjectWriteOptions) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.lock().unwrap().contains(key) {
            return Err(StorageError::UploadFailed(format!("injected failure for {}", key)));
        }
        let mut objects = self.objects.lock().unwrap();
        if options.create_only && objects.contains_key(key) {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.lock().unwrap().contains(key) {
            return Err(StorageError::DeleteFailed(format!("injected failure for {}", key)));
        }
        match self.objects.lock().unwrap().remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(key.to_string())),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.contains(key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// Holds writes of one key until `parties` writers have arrived, so
/// concurrent flows reach that write together.
pub struct GatedStorage {
    inner: Arc<MemoryStorage>,
    key: String,
    barrier: Barrier,
}

impl GatedStorage {
    pub fn new(inner: Arc<MemoryStorage>, key: &str, parties: usize) -> Self {
        Self {
            inner,
            key: key.to_string(),
            barrier: Barrier::new(parties),
        }
    }
}

#[async_trait]
impl Storage for GatedStorage {
    async fn put(&self, key: &str, data: Bytes, options: &ObjectWriteOptions) -> StorageResult<()> {
        if key == self.key {
            self.barrier.wait().await;
        }
        self.inner.put(key, data, options).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// How the next soft-delete of an active row behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoftDeleteMode {
    #[default]
    Normal,
    /// Fails without touching the row
    Fail,
    /// Changes the row, then reports an error
    FailAfterWrite,
    /// Reports that the row was no longer active
    LoseRace,
}

pub struct MemoryRecordStore {
    pub rows: Mutex<BTreeMap<i64, PhotoAsset>>,
    pub servers: Mutex<HashMap<i64, String>>,
    pub logs: Mutex<HashMap<i64, i64>>,
    next_id: AtomicI64,
    pub fail_create: AtomicBool,
    pub fail_finalize: AtomicBool,
    pub fail_hard_delete: AtomicBool,
    pub fail_restore: AtomicBool,
    pub soft_delete_mode: Mutex<SoftDeleteMode>,
    pub calls: AtomicUsize,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            servers: Mutex::new(HashMap::from([(SERVER_ID, BASE_URL.to_string())])),
            logs: Mutex::new(HashMap::from([(LOG_ID, OWNER)])),
            next_id: AtomicI64::new(1),
            fail_create: AtomicBool::new(false),
            fail_finalize: AtomicBool::new(false),
            fail_hard_delete: AtomicBool::new(false),
            fail_restore: AtomicBool::new(false),
            soft_delete_mode: Mutex::new(SoftDeleteMode::Normal),
            calls: AtomicUsize::new(0),
        }
    }
}

impl MemoryRecordStore {
    pub fn row(&self, photo_id: i64) -> Option<PhotoAsset> {
        self.rows.lock().unwrap().get(&photo_id).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn active_rows(&self) -> Vec<PhotoAsset> {
        self.rows
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.is_active())
            .cloned()
            .collect()
    }

    pub fn set_soft_delete_mode(&self, mode: SoftDeleteMode) {
        *self.soft_delete_mode.lock().unwrap() = mode;
    }

    fn injected(what: &str) -> AppError {
        AppError::Internal(format!("injected {} failure", what))
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
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Self::injected("insert"));
        }
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
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(Self::injected("finalize"));
        }
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
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.flip(photo_id, from, to))
    }

    async fn hard_delete(&self, photo_id: i64) -> Result<bool, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_hard_delete.load(Ordering::SeqCst) {
            return Err(Self::injected("delete"));
        }
        Ok(self.rows.lock().unwrap().remove(&photo_id).is_some())
    }

    async fn update_metadata(
        &self,
        photo_id: i64,
        update: &PhotoMetadataUpdate,
    ) -> Result<Option<PhotoAsset>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
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
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.row(photo_id))
    }

    async fn server_base_url(&self, server_id: i64) -> Result<Option<String>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.servers.lock().unwrap().get(&server_id).cloned())
    }

    async fn log_owner(&self, log_id: i64) -> Result<Option<i64>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.logs.lock().unwrap().get(&log_id).copied())
    }

    async fn soft_delete(&self, photo_id: i64) -> Result<bool, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.soft_delete_mode.lock().unwrap();
        match mode {
            SoftDeleteMode::Normal => {
                Ok(self.flip(photo_id, LifecycleFlag::Active, LifecycleFlag::SoftDeleted))
            }
            SoftDeleteMode::Fail => Err(Self::injected("soft delete")),
            SoftDeleteMode::FailAfterWrite => {
                self.flip(photo_id, LifecycleFlag::Active, LifecycleFlag::SoftDeleted);
                Err(Self::injected("soft delete"))
            }
            SoftDeleteMode::LoseRace => Ok(false),
        }
    }

    async fn restore_active(&self, photo_id: i64) -> Result<bool, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_restore.load(Ordering::SeqCst) {
            return Err(Self::injected("restore"));
        }
        Ok(self.flip(photo_id, LifecycleFlag::SoftDeleted, LifecycleFlag::Active))
    }
}

/// Serves objects of a [`MemoryStorage`] under [`BASE_URL`].
pub struct MemoryFetcher {
    storage: Arc<MemoryStorage>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new(storage: Arc<MemoryStorage>) -> Self {
        Self {
            storage,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PhotoFetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(FetchError::Transport {
                url: url.to_string(),
                message: "connection refused".to_string(),
            });
        }
        let missing = || FetchError::Status {
            url: url.to_string(),
            status: 404,
        };
        let key = url.strip_prefix(BASE_URL).ok_or_else(missing)?;
        self.storage
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(missing)
    }
}

#[derive(Default)]
pub struct RecordingQueue {
    pub jobs: Mutex<Vec<i64>>,
    pub full: AtomicBool,
}

impl RecordingQueue {
    pub fn jobs(&self) -> Vec<i64> {
        self.jobs.lock().unwrap().clone()
    }
}

impl ModerationQueue for RecordingQueue {
    fn enqueue(&self, photo_id: i64) -> Result<(), EnqueueError> {
        if self.full.load(Ordering::SeqCst) {
            return Err(EnqueueError::Full);
        }
        self.jobs.lock().unwrap().push(photo_id);
        Ok(())
    }
}

pub struct TestEnv {
    pub storage: Arc<MemoryStorage>,
    pub records: Arc<MemoryRecordStore>,
    pub fetcher: Arc<MemoryFetcher>,
    pub queue: Arc<RecordingQueue>,
    pub lifecycle: PhotoLifecycle,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_queue(Arc::new(RecordingQueue::default()))
    }

    pub fn with_queue(queue: Arc<RecordingQueue>) -> Self {
        Self::build(queue, PhotoCodec::default())
    }

    pub fn with_codec(settings: CodecSettings) -> Self {
        Self::build(Arc::new(RecordingQueue::default()), PhotoCodec::new(settings))
    }

    fn build(queue: Arc<RecordingQueue>, codec: PhotoCodec) -> Self {
        let storage = Arc::new(MemoryStorage::default());
        let records = Arc::new(MemoryRecordStore::default());
        let fetcher = Arc::new(MemoryFetcher::new(storage.clone()));
        let lifecycle = Self::orchestrator(
            storage.clone(),
            records.clone(),
            fetcher.clone(),
            queue.clone(),
            codec,
        );
        Self {
            storage,
            records,
            fetcher,
            queue,
            lifecycle,
        }
    }

    fn orchestrator(
        storage: Arc<dyn Storage>,
        records: Arc<MemoryRecordStore>,
        fetcher: Arc<MemoryFetcher>,
        queue: Arc<RecordingQueue>,
        codec: PhotoCodec,
    ) -> PhotoLifecycle {
        let gateway = ObjectStoreGateway::new(
            storage,
            Duration::from_secs(5),
            "public, max-age=60".to_string(),
        );
        PhotoLifecycle::new(records, gateway, fetcher, codec, queue, SERVER_ID)
    }

    /// A separate orchestrator, as another server process would run it:
    /// same records, fetcher and queue, own photo locks, writing through
    /// `storage`.
    pub fn peer_lifecycle(&self, storage: Arc<dyn Storage>) -> PhotoLifecycle {
        Self::orchestrator(
            storage,
            self.records.clone(),
            self.fetcher.clone(),
            self.queue.clone(),
            PhotoCodec::default(),
        )
    }

    /// Upload a photo as the log owner and return its id.
    pub async fn seed(&self, width: u32, height: u32) -> i64 {
        self.lifecycle
            .create_photo(owner(), submission("Pillar"), jpeg(width, height))
            .await
            .unwrap()
            .id
    }

    /// Calls made to any collaborator so far.
    pub fn io_calls(&self) -> usize {
        self.storage.calls.load(Ordering::SeqCst)
            + self.records.calls.load(Ordering::SeqCst)
            + self.fetcher.calls.load(Ordering::SeqCst)
    }
}
