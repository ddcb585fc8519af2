use sqlx::{PgPool, Postgres};
use trigpics_core::models::Server;
use trigpics_core::AppError;

/// Row type for the server table.
#[derive(Debug, sqlx::FromRow)]
pub struct ServerRow {
    pub id: i64,
    pub url: String,
    pub path: String,
    pub name: String,
}

impl From<ServerRow> for Server {
    fn from(row: ServerRow) -> Self {
        Server {
            id: row.id,
            url: row.url,
            path: row.path,
            name: row.name,
        }
    }
}

/// Read-only access to the photo hosts.
#[derive(Clone)]
pub struct ServerRepository {
    pool: PgPool,
}

impl ServerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "server", db.operation = "select", db.record_id = server_id))]
    pub async fn get_by_id(&self, server_id: i64) -> Result<Option<Server>, AppError> {
        let row: Option<ServerRow> = sqlx::query_as::<Postgres, ServerRow>(
            "SELECT id, url, path, name FROM server WHERE id = $1",
        )
        .bind(server_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Server::from))
    }
}
