use sqlx::PgPool;
use trigpics_core::AppError;

/// Log entries, consulted only to find who owns a photo.
#[derive(Clone)]
pub struct LogRepository {
    pool: PgPool,
}

impl LogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// User id owning the log entry, `None` for an unknown entry.
    #[tracing::instrument(skip(self), fields(db.table = "tlog", db.operation = "select", db.record_id = log_id))]
    pub async fn owner_of(&self, log_id: i64) -> Result<Option<i64>, AppError> {
        let owner: Option<i64> = sqlx::query_scalar("SELECT user_id FROM tlog WHERE id = $1")
            .bind(log_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner)
    }
}
