use crate::traits::{ObjectVisibility, ObjectWriteOptions, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ClientOptions, ObjectStore, ObjectStoreExt, PutMode, PutOptions,
    PutPayload, Result as ObjectResult,
};

/// Canned ACL header understood by S3 and most S3-compatible providers
const ACL_HEADER: &str = "x-amz-acl";

/// S3 storage implementation
///
/// Holds two clients for the same bucket: one that stamps `public-read` on
/// every write and one that leaves the bucket default ACL in place.
#[derive(Clone)]
pub struct S3Storage {
    public_store: AmazonS3,
    private_store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub fn new(bucket: String, region: String, endpoint_url: Option<String>) -> StorageResult<Self> {
        let mut public_headers = HeaderMap::new();
        public_headers.insert(ACL_HEADER, HeaderValue::from_static("public-read"));

        let public_store = Self::build(
            &bucket,
            &region,
            endpoint_url.as_deref(),
            ClientOptions::new().with_default_headers(public_headers),
        )?;
        let private_store = Self::build(
            &bucket,
            &region,
            endpoint_url.as_deref(),
            ClientOptions::new(),
        )?;

        tracing::info!(
            bucket = %bucket,
            region = %region,
            endpoint = ?endpoint_url,
            "S3 photo storage configured"
        );

        Ok(S3Storage {
            public_store,
            private_store,
            bucket,
        })
    }

    fn build(
        bucket: &str,
        region: &str,
        endpoint_url: Option<&str>,
        client_options: ClientOptions,
    ) -> StorageResult<AmazonS3> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket)
            .with_client_options(client_options);

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))
    }

    fn store_for(&self, visibility: ObjectVisibility) -> &AmazonS3 {
        match visibility {
            ObjectVisibility::PublicRead => &self.public_store,
            ObjectVisibility::Private => &self.private_store,
        }
    }

    fn put_mode(options: &ObjectWriteOptions) -> PutMode {
        if options.create_only {
            PutMode::Create
        } else {
            PutMode::Overwrite
        }
    }

    fn attributes(options: &ObjectWriteOptions) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, options.content_type.clone().into());
        if let Some(ref cache_control) = options.cache_control {
            attributes.insert(Attribute::CacheControl, cache_control.clone().into());
        }
        attributes
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        options: &ObjectWriteOptions,
    ) -> StorageResult<()> {
        let size = data.len() as u64;
        let location = Path::from(key.to_string());
        let put_options = PutOptions {
            mode: Self::put_mode(options),
            attributes: Self::attributes(options),
            ..Default::default()
        };
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self
            .store_for(options.visibility)
            .put_opts(&location, PutPayload::from(data), put_options)
            .await;

        result.map_err(|e| {
            if let ObjectStoreError::AlreadyExists { .. } = e {
                tracing::info!(bucket = %self.bucket, key = %key, "S3 key already taken");
                return StorageError::AlreadyExists(key.to_string());
            }
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            visibility = ?options.visibility,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let start = std::time::Instant::now();
        let location = Path::from(key.to_string());

        let result: ObjectResult<_> = self.private_store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(bytes)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = Path::from(key.to_string());

        let result: ObjectResult<_> = self.private_store.delete(&location).await;

        result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                StorageError::DeleteFailed(other.to_string())
            }
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let location = Path::from(key.to_string());
        match self.private_store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
