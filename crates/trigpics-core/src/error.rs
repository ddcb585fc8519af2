//! Error types module
//!
//! Every failure a photo flow can surface is an [`AppError`]. Variants fall
//! into five categories (see [`ErrorCategory`]):
//!
//! - client input problems (`InvalidInput`, `ImageValidation`)
//! - unknown resources (`NotFound`)
//! - authorization failures (`Unauthorized`, `Forbidden`)
//! - downstream failures after compensation has run (`Database`, `Storage`,
//!   `Fetch`, `Timeout`, `ImageProcessing`, `Internal`)
//! - failed compensation (`Integrity`), the only unrecoverable server case
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors like validation failures
    Debug,
    /// Recoverable downstream issues
    Warn,
    /// Unexpected failures and integrity breaches
    Error,
}

/// Coarse classification used by callers deciding whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Authorization,
    TransientInfra,
    Integrity,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "DATABASE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether an identical retry can succeed
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Invalid image: {0}")]
    ImageValidation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A compensating action failed; the listed rows and keys need manual
    /// reconciliation.
    #[error("Integrity error: {message} (photo_ids={photo_ids:?}, keys={keys:?})")]
    Integrity {
        message: String,
        photo_ids: Vec<i64>,
        keys: Vec<String>,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            502,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Fetch(_) => (
            502,
            "FETCH_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Warn,
        ),
        AppError::Timeout(_) => (
            504,
            "TIMEOUT",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Warn,
        ),
        AppError::ImageProcessing(_) => (
            500,
            "IMAGE_PROCESSING_ERROR",
            false,
            Some("Try a different file"),
            false,
            LogLevel::Warn,
        ),
        AppError::ImageValidation(_) => (
            400,
            "INVALID_IMAGE",
            false,
            Some("Upload a JPEG, PNG or WebP image within the size limit"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Sign in and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (
            403,
            "FORBIDDEN",
            false,
            Some("Only the log owner or an administrator can change this photo"),
            false,
            LogLevel::Debug,
        ),
        AppError::Integrity { .. } => (
            500,
            "INTEGRITY_ERROR",
            false,
            Some("Contact support; the operation needs manual repair"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Builds an integrity error from the rows and keys left behind.
    pub fn integrity(
        message: impl Into<String>,
        photo_ids: impl IntoIterator<Item = i64>,
        keys: impl IntoIterator<Item = String>,
    ) -> Self {
        AppError::Integrity {
            message: message.into(),
            photo_ids: photo_ids.into_iter().collect(),
            keys: keys.into_iter().collect(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::InvalidInput(_) | AppError::ImageValidation(_) => ErrorCategory::Validation,
            AppError::NotFound(_) => ErrorCategory::NotFound,
            AppError::Unauthorized(_) | AppError::Forbidden(_) => ErrorCategory::Authorization,
            AppError::Integrity { .. } => ErrorCategory::Integrity,
            AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Fetch(_)
            | AppError::Timeout(_)
            | AppError::ImageProcessing(_)
            | AppError::Internal(_)
            | AppError::InternalWithSource { .. } => ErrorCategory::TransientInfra,
        }
    }

    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::Fetch(_) => "Fetch",
            AppError::Timeout(_) => "Timeout",
            AppError::ImageProcessing(_) => "ImageProcessing",
            AppError::ImageValidation(_) => "ImageValidation",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Integrity { .. } => "Integrity",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access photo storage".to_string(),
            AppError::Fetch(_) => "Failed to download photo".to_string(),
            AppError::Timeout(_) => "A downstream service timed out".to_string(),
            AppError::ImageProcessing(_) => "Failed to process image".to_string(),
            AppError::ImageValidation(ref msg) => msg.clone(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::Forbidden(ref msg) => msg.clone(),
            AppError::Integrity { .. } => "Photo storage is in an inconsistent state".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
