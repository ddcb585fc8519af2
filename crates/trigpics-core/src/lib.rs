//! Trigpics Core Library
//!
//! Domain models, the error taxonomy and configuration shared by every
//! trigpics crate: the image codec, the storage gateway, the record store
//! and the photo lifecycle orchestrator.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, PhotoPipelineConfig};
pub use error::{AppError, ErrorCategory, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
