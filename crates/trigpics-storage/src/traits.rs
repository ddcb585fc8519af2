//! Storage abstraction traits
//!
//! [`Storage`] is implemented by every object store backend. [`PhotoFetcher`]
//! downloads an already published photo through its public URL.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use trigpics_core::AppError;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage operation timed out: {0}")]
    Timeout(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object not found: {}", key)),
            StorageError::Timeout(msg) => AppError::Timeout(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Who may read an object once written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectVisibility {
    PublicRead,
    Private,
}

/// Per-object metadata applied on write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectWriteOptions {
    pub content_type: String,
    pub cache_control: Option<String>,
    pub visibility: ObjectVisibility,
    /// Fail with [`StorageError::AlreadyExists`] instead of replacing an object
    pub create_only: bool,
}

impl ObjectWriteOptions {
    /// Options for a publicly served JPEG.
    pub fn public_jpeg(cache_control: impl Into<String>) -> Self {
        Self {
            content_type: "image/jpeg".to_string(),
            cache_control: Some(cache_control.into()),
            visibility: ObjectVisibility::PublicRead,
            create_only: false,
        }
    }

    /// Same options, refusing to replace an existing object.
    pub fn create_only(mut self) -> Self {
        self.create_only = true;
        self
    }
}

/// Storage abstraction trait
///
/// Keys are produced by [`crate::keys`]; backends treat them as opaque paths.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under `key`.
    ///
    /// An existing object is replaced unless `options.create_only` is set, in
    /// which case the write fails with [`StorageError::AlreadyExists`] and
    /// the existing object is left untouched.
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        options: &ObjectWriteOptions,
    ) -> StorageResult<()>;

    /// Read the object stored under `key`.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Remove the object under `key`.
    ///
    /// Backends that can tell a missing key apart report it as
    /// [`StorageError::NotFound`].
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Download failures for public photo URLs
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout { .. } => AppError::Timeout(err.to_string()),
            FetchError::TooLarge { .. } => AppError::ImageValidation(err.to_string()),
            other => AppError::Fetch(other.to_string()),
        }
    }
}

/// Downloads published photo bytes by URL
#[async_trait]
pub trait PhotoFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}
