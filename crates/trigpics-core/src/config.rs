//! Configuration module
//!
//! Settings are read from the process environment (after loading `.env` with
//! dotenvy). Numeric values that fail to parse fall back to their defaults;
//! required values that are missing abort startup.

use std::env;

use crate::storage_types::StorageBackend;

const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const SERVER_PORT: u16 = 3000;

/// Settings shared by anything that serves HTTP or talks to the database
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_host: String,
    pub server_port: u16,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    pub log_format: String,
    /// Reverse proxies in front of the API whose forwarding headers are trusted
    pub trusted_proxy_count: usize,
}

/// Photo pipeline configuration
#[derive(Clone, Debug)]
pub struct PhotoPipelineConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub local_storage_path: String,
    pub storage_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub cache_control: String,
    /// Server row new photos are attached to
    pub photos_server_id: i64,
    // Image codec configuration
    pub max_image_size_bytes: usize,
    pub max_image_dimension: u32,
    pub thumbnail_size: u32,
    pub main_jpeg_quality: u8,
    pub thumbnail_jpeg_quality: u8,
    // Moderation queue
    pub moderation_queue_capacity: usize,
    pub moderation_workers: usize,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PhotoPipelineConfig>);

impl Config {
    fn as_pipeline(&self) -> &PhotoPipelineConfig {
        &self.0
    }

    pub fn is_production(&self) -> bool {
        matches!(
            self.as_pipeline().base.environment.to_lowercase().as_str(),
            "production" | "prod"
        )
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = PhotoPipelineConfig::from_env()?;
        config.validate()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_pipeline().validate()
    }

    pub fn server_host(&self) -> &str {
        &self.as_pipeline().base.server_host
    }

    pub fn server_port(&self) -> u16 {
        self.as_pipeline().base.server_port
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_pipeline().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_pipeline().base.db_timeout_seconds
    }

    pub fn environment(&self) -> &str {
        &self.as_pipeline().base.environment
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.as_pipeline().base.trusted_proxy_count
    }

    pub fn log_format(&self) -> &str {
        &self.as_pipeline().base.log_format
    }

    pub fn database_url(&self) -> &str {
        &self.as_pipeline().database_url
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_pipeline().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.as_pipeline().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> &str {
        &self.as_pipeline().s3_region
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_pipeline().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> &str {
        &self.as_pipeline().local_storage_path
    }

    pub fn storage_timeout_secs(&self) -> u64 {
        self.as_pipeline().storage_timeout_secs
    }

    pub fn fetch_timeout_secs(&self) -> u64 {
        self.as_pipeline().fetch_timeout_secs
    }

    pub fn cache_control(&self) -> &str {
        &self.as_pipeline().cache_control
    }

    pub fn photos_server_id(&self) -> i64 {
        self.as_pipeline().photos_server_id
    }

    pub fn max_image_size_bytes(&self) -> usize {
        self.as_pipeline().max_image_size_bytes
    }

    pub fn max_image_dimension(&self) -> u32 {
        self.as_pipeline().max_image_dimension
    }

    pub fn thumbnail_size(&self) -> u32 {
        self.as_pipeline().thumbnail_size
    }

    pub fn main_jpeg_quality(&self) -> u8 {
        self.as_pipeline().main_jpeg_quality
    }

    pub fn thumbnail_jpeg_quality(&self) -> u8 {
        self.as_pipeline().thumbnail_jpeg_quality
    }

    pub fn moderation_queue_capacity(&self) -> usize {
        self.as_pipeline().moderation_queue_capacity
    }

    pub fn moderation_workers(&self) -> usize {
        self.as_pipeline().moderation_workers
    }
}

fn env_or<T: std::str::FromStr + ToString>(key: &str, default: T) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}

impl PhotoPipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        const MAX_IMAGE_SIZE_BYTES: usize = 20 * 1024 * 1024;
        const MAX_IMAGE_DIMENSION: u32 = 4000;
        const THUMBNAIL_SIZE: u32 = 120;
        const MAIN_JPEG_QUALITY: u8 = 95;
        const THUMBNAIL_JPEG_QUALITY: u8 = 85;
        const STORAGE_TIMEOUT_SECS: u64 = 30;
        const FETCH_TIMEOUT_SECS: u64 = 30;
        const MODERATION_QUEUE_CAPACITY: usize = 256;
        const MODERATION_WORKERS: usize = 2;
        const PHOTOS_SERVER_ID: i64 = 1;

        let base = BaseConfig {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?,
            db_max_connections: env_or("DATABASE_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DATABASE_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "text".to_string())
                .to_lowercase(),
            trusted_proxy_count: env_or("TRUSTED_PROXY_COUNT", 0),
        };

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::S3,
        };

        Ok(Self {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok().filter(|s| !s.trim().is_empty()),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .unwrap_or_else(|_| "eu-west-1".to_string()),
            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.trim().is_empty()),
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| "./data/photos".to_string()),
            storage_timeout_secs: env_or("STORAGE_TIMEOUT_SECS", STORAGE_TIMEOUT_SECS),
            fetch_timeout_secs: env_or("FETCH_TIMEOUT_SECS", FETCH_TIMEOUT_SECS),
            cache_control: env::var("PHOTO_CACHE_CONTROL")
                .unwrap_or_else(|_| "public, max-age=31536000".to_string()),
            photos_server_id: env_or("PHOTOS_SERVER_ID", PHOTOS_SERVER_ID),
            max_image_size_bytes: env_or("MAX_IMAGE_SIZE", MAX_IMAGE_SIZE_BYTES),
            max_image_dimension: env_or("MAX_IMAGE_DIMENSION", MAX_IMAGE_DIMENSION),
            thumbnail_size: env_or("THUMBNAIL_SIZE", THUMBNAIL_SIZE),
            main_jpeg_quality: env_or("MAIN_JPEG_QUALITY", MAIN_JPEG_QUALITY),
            thumbnail_jpeg_quality: env_or("THUMBNAIL_JPEG_QUALITY", THUMBNAIL_JPEG_QUALITY),
            moderation_queue_capacity: env_or(
                "MODERATION_QUEUE_CAPACITY",
                MODERATION_QUEUE_CAPACITY,
            ),
            moderation_workers: env_or("MODERATION_WORKERS", MODERATION_WORKERS),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.storage_backend == StorageBackend::S3 && self.s3_bucket.is_none() {
            return Err(anyhow::anyhow!(
                "S3_BUCKET must be set when using S3 storage backend"
            ));
        }

        if self.max_image_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_IMAGE_SIZE must be greater than zero"));
        }

        if self.max_image_dimension == 0 || self.thumbnail_size == 0 {
            return Err(anyhow::anyhow!(
                "MAX_IMAGE_DIMENSION and THUMBNAIL_SIZE must be greater than zero"
            ));
        }

        if self.thumbnail_size > self.max_image_dimension {
            return Err(anyhow::anyhow!(
                "THUMBNAIL_SIZE ({}) cannot exceed MAX_IMAGE_DIMENSION ({})",
                self.thumbnail_size,
                self.max_image_dimension
            ));
        }

        for (name, quality) in [
            ("MAIN_JPEG_QUALITY", self.main_jpeg_quality),
            ("THUMBNAIL_JPEG_QUALITY", self.thumbnail_jpeg_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(anyhow::anyhow!("{} must be between 1 and 100", name));
            }
        }

        if self.moderation_workers == 0 || self.moderation_queue_capacity == 0 {
            return Err(anyhow::anyhow!(
                "MODERATION_WORKERS and MODERATION_QUEUE_CAPACITY must be greater than zero"
            ));
        }

        Ok(())
    }
}
