//! Trigpics Storage Library
//!
//! Object storage for photo assets: the [`Storage`] trait with S3 and local
//! filesystem backends, key derivation, and the [`ObjectStoreGateway`] that
//! writes and removes a photo's main image and thumbnail as a pair.
//!
//! # Storage key format
//!
//! Every photo owns two objects, both keyed by the photo id:
//!
//! - **Main image**: `{folder:03}/P{id:05}.jpg`
//! - **Thumbnail**: `{folder:03}/I{id:05}.jpg`
//!
//! where `folder = id / 1000`. A rotated photo keeps the keys of the photo it
//! was derived from and gains a revision suffix (`_r1`, `_r2`, ...), see
//! [`next_revision`]. Keys must not contain `..` or a leading `/`.

pub mod factory;
#[cfg(feature = "http-fetch")]
pub mod fetch;
pub mod gateway;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "http-fetch")]
pub use fetch::HttpPhotoFetcher;
pub use gateway::{GatewayError, ObjectStoreGateway, PhotoObjectKeys};
pub use keys::{next_revision, photo_key, revision_number, thumbnail_key};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{
    FetchError, ObjectVisibility, ObjectWriteOptions, PhotoFetcher, Storage, StorageError,
    StorageResult,
};
pub use trigpics_core::StorageBackend;
