//! Paired writes and removals of a photo's main image and thumbnail.
//!
//! A pair is all-or-nothing for readers: when a write fails after earlier
//! writes landed, exactly the keys already written are deleted again before
//! the error is returned.
//!
//! Pair writes never replace an existing object. A key held by someone else
//! surfaces as [`GatewayError::KeyTaken`], so a caller only ever deletes keys
//! it wrote itself.

use crate::keys::{next_revision, photo_key, thumbnail_key};
use crate::traits::{ObjectVisibility, ObjectWriteOptions, Storage, StorageError};
use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use trigpics_core::AppError;

/// Keys of the two objects belonging to one photo row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoObjectKeys {
    pub main: String,
    pub thumbnail: String,
}

impl PhotoObjectKeys {
    /// Keys for a newly uploaded photo.
    pub fn for_photo(photo_id: i64) -> Self {
        Self {
            main: photo_key(photo_id),
            thumbnail: thumbnail_key(photo_id),
        }
    }

    /// Keys for the next revision of an existing pair.
    pub fn next_revision_of(main: &str, thumbnail: &str) -> Self {
        Self {
            main: next_revision(main),
            thumbnail: next_revision(thumbnail),
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        vec![self.main.clone(), self.thumbnail.clone()]
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// A key of the pair already holds an object; nothing this call wrote remains
    #[error("Object key {key} is already taken")]
    KeyTaken { key: String },

    /// Nothing from the pair remains in the store
    #[error("Failed to write {key}: {source}")]
    WriteFailed {
        key: String,
        #[source]
        source: StorageError,
    },

    /// The write failed and removing the keys written before it failed too
    #[error("Failed to write {key} and could not remove {orphaned:?}: {source}")]
    RollbackFailed {
        key: String,
        #[source]
        source: StorageError,
        orphaned: Vec<String>,
    },

    /// Some keys could not be removed
    #[error("Failed to delete {failed:?}: {source}")]
    DeleteFailed {
        failed: Vec<String>,
        #[source]
        source: StorageError,
    },
}

impl GatewayError {
    /// Keys that may still exist in the store after this error.
    pub fn leftover_keys(&self) -> &[String] {
        match self {
            GatewayError::KeyTaken { .. } | GatewayError::WriteFailed { .. } => &[],
            GatewayError::RollbackFailed { orphaned, .. } => orphaned,
            GatewayError::DeleteFailed { failed, .. } => failed,
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::KeyTaken { key } => {
                AppError::Storage(format!("object key {} is already taken", key))
            }
            GatewayError::WriteFailed { source, .. } => AppError::from(source),
            GatewayError::RollbackFailed {
                key,
                source,
                orphaned,
            } => AppError::integrity(
                format!("write of {} failed ({}) and rollback failed", key, source),
                [],
                orphaned,
            ),
            GatewayError::DeleteFailed { failed, source } => AppError::Storage(format!(
                "failed to delete {:?}: {}",
                failed, source
            )),
        }
    }
}

/// Object store gateway for photo pairs.
#[derive(Clone)]
pub struct ObjectStoreGateway {
    storage: Arc<dyn Storage>,
    timeout: Duration,
    cache_control: String,
}

impl ObjectStoreGateway {
    pub fn new(storage: Arc<dyn Storage>, timeout: Duration, cache_control: String) -> Self {
        Self {
            storage,
            timeout,
            cache_control,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    async fn bounded<T, F>(&self, operation: &str, key: &str, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(format!(
                "{} of {} exceeded {}s",
                operation,
                key,
                self.timeout.as_secs()
            ))),
        }
    }

    /// Write the main image and thumbnail under `keys`, which must be unused.
    ///
    /// On failure every key this call may have written is deleted again; if
    /// that cleanup fails the leftover keys are reported in
    /// [`GatewayError::RollbackFailed`]. A key that already holds an object
    /// is reported as [`GatewayError::KeyTaken`] and left untouched.
    #[tracing::instrument(skip(self, main, thumbnail), fields(main_key = %keys.main, thumbnail_key = %keys.thumbnail))]
    pub async fn put_pair(
        &self,
        keys: &PhotoObjectKeys,
        main: Bytes,
        thumbnail: Bytes,
        visibility: ObjectVisibility,
    ) -> Result<(), GatewayError> {
        let options = ObjectWriteOptions {
            content_type: "image/jpeg".to_string(),
            cache_control: Some(self.cache_control.clone()),
            visibility,
            create_only: true,
        };

        let mut written: Vec<String> = Vec::with_capacity(2);
        for (key, data) in [(&keys.main, main), (&keys.thumbnail, thumbnail)] {
            let start = std::time::Instant::now();
            let size = data.len();
            match self
                .bounded("put", key, self.storage.put(key, data, &options))
                .await
            {
                Ok(()) => {
                    tracing::debug!(
                        key = %key,
                        size_bytes = size,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Photo object written"
                    );
                    written.push(key.clone());
                }
                Err(source) => {
                    // A timed-out put may still land.
                    if matches!(source, StorageError::Timeout(_)) {
                        written.push(key.clone());
                    }
                    tracing::warn!(
                        error = %source,
                        key = %key,
                        rollback_keys = ?written,
                        "Photo object write failed, removing partial pair"
                    );
                    return match self.delete_keys(&written).await {
                        Ok(()) if matches!(source, StorageError::AlreadyExists(_)) => {
                            Err(GatewayError::KeyTaken { key: key.clone() })
                        }
                        Ok(()) => Err(GatewayError::WriteFailed {
                            key: key.clone(),
                            source,
                        }),
                        Err(GatewayError::DeleteFailed { failed, .. }) => {
                            tracing::error!(
                                key = %key,
                                orphaned = ?failed,
                                "Rollback of partial photo pair failed"
                            );
                            Err(GatewayError::RollbackFailed {
                                key: key.clone(),
                                source,
                                orphaned: failed,
                            })
                        }
                        Err(other) => Err(other),
                    };
                }
            }
        }

        Ok(())
    }

    /// Remove both objects of a pair, tolerating keys that are already gone.
    #[tracing::instrument(skip(self), fields(main_key = %keys.main, thumbnail_key = %keys.thumbnail))]
    pub async fn delete_pair(&self, keys: &PhotoObjectKeys) -> Result<(), GatewayError> {
        self.delete_keys(&keys.to_vec()).await
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<(), GatewayError> {
        let mut failed = Vec::new();
        let mut first_error = None;

        // Reverse write order
        for key in keys.iter().rev() {
            match self.bounded("delete", key, self.storage.delete(key)).await {
                Ok(()) => tracing::debug!(key = %key, "Photo object deleted"),
                Err(StorageError::NotFound(_)) => {
                    tracing::info!(key = %key, "Photo object already absent")
                }
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "Photo object delete failed");
                    failed.push(key.clone());
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => Ok(()),
            Some(source) => {
                failed.reverse();
                Err(GatewayError::DeleteFailed { failed, source })
            }
        }
    }

    /// Read a single object, bounded by the gateway timeout.
    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        self.bounded("get", key, self.storage.get(key)).await
    }
}
