use sqlx::PgPool;
use std::path::PathBuf;
use trigpics_services::PhotoLifecycle;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: PhotoLifecycle,
    /// Checked by the health endpoint when present
    pub db_pool: Option<PgPool>,
    /// Largest accepted image upload in bytes
    pub max_upload_bytes: usize,
    pub trusted_proxy_count: usize,
    /// Directory served under `/photos` when objects live on local disk
    pub local_photos_dir: Option<PathBuf>,
}
