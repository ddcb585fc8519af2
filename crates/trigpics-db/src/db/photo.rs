//! Photo repository: the `tphoto` table.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use trigpics_core::models::{
    ImageAssetMeta, LifecycleFlag, NewPhoto, PhotoAsset, PhotoMetadataUpdate, PhotoType,
    Provenance, Visibility,
};
use trigpics_core::AppError;

const PHOTO_COLUMNS: &str = "id, tlog_id, server_id, type, filename, filesize, height, width, \
     icon_filename, icon_filesize, icon_height, icon_width, name, text_desc, ip_addr, \
     public_ind, deleted_ind, source, crt_timestamp";

/// Row type for the tphoto table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct PhotoRow {
    pub id: i64,
    pub tlog_id: i64,
    pub server_id: i64,
    #[sqlx(rename = "type")]
    pub photo_type: String,
    pub filename: String,
    pub filesize: i64,
    pub height: i32,
    pub width: i32,
    pub icon_filename: String,
    pub icon_filesize: i64,
    pub icon_height: i32,
    pub icon_width: i32,
    pub name: String,
    pub text_desc: String,
    pub ip_addr: String,
    pub public_ind: String,
    pub deleted_ind: String,
    pub source: String,
    pub crt_timestamp: DateTime<Utc>,
}

impl PhotoRow {
    pub fn to_photo_asset(self) -> Result<PhotoAsset, AppError> {
        let id = self.id;
        let corrupt = |e: AppError| {
            AppError::Internal(format!("Stored photo {} has an invalid code: {}", id, e))
        };

        Ok(PhotoAsset {
            id: self.id,
            log_id: self.tlog_id,
            server_id: self.server_id,
            photo_type: PhotoType::from_code(&self.photo_type).map_err(corrupt)?,
            main: ImageAssetMeta {
                key: self.filename,
                byte_size: self.filesize,
                width: self.width,
                height: self.height,
            },
            thumbnail: ImageAssetMeta {
                key: self.icon_filename,
                byte_size: self.icon_filesize,
                width: self.icon_width,
                height: self.icon_height,
            },
            caption: self.name,
            description: self.text_desc,
            ip_addr: self.ip_addr,
            visibility: Visibility::from_code(&self.public_ind).map_err(corrupt)?,
            lifecycle: LifecycleFlag::from_code(&self.deleted_ind).map_err(corrupt)?,
            provenance: Provenance::from_code(&self.source).map_err(corrupt)?,
            created_at: self.crt_timestamp,
        })
    }
}

/// Repository for the tphoto table.
///
/// Lifecycle transitions are conditional on the current flag and report
/// whether a row actually changed, so callers can tell a lost race from a
/// successful transition.
#[derive(Clone)]
pub struct PhotoRepository {
    pool: PgPool,
}

impl PhotoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a row with empty key fields and return it with its new id.
    #[tracing::instrument(
        skip(self, photo),
        fields(db.table = "tphoto", db.operation = "insert", log_id = photo.log_id)
    )]
    pub async fn create_placeholder(&self, photo: &NewPhoto) -> Result<PhotoAsset, AppError> {
        let row: PhotoRow = sqlx::query_as::<Postgres, PhotoRow>(&format!(
            r#"
            INSERT INTO tphoto (
                tlog_id, server_id, type, filename, filesize, height, width,
                icon_filename, icon_filesize, icon_height, icon_width,
                name, text_desc, ip_addr, public_ind, deleted_ind, source
            )
            VALUES ($1, $2, $3, '', $4, $5, $6, '', $7, $8, $9, $10, $11, $12, $13, 'N', $14)
            RETURNING {}
            "#,
            PHOTO_COLUMNS
        ))
        .bind(photo.log_id)
        .bind(photo.server_id)
        .bind(photo.photo_type.code())
        .bind(photo.main.byte_size)
        .bind(photo.main.height)
        .bind(photo.main.width)
        .bind(photo.thumbnail.byte_size)
        .bind(photo.thumbnail.height)
        .bind(photo.thumbnail.width)
        .bind(&photo.caption)
        .bind(&photo.description)
        .bind(&photo.ip_addr)
        .bind(photo.visibility.code())
        .bind(photo.provenance.code())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(photo_id = row.id, "Placeholder photo row created");
        row.to_photo_asset()
    }

    /// Write the object keys onto a placeholder row.
    #[tracing::instrument(skip(self), fields(db.table = "tphoto", db.operation = "update", db.record_id = photo_id))]
    pub async fn finalize(
        &self,
        photo_id: i64,
        main_key: &str,
        thumbnail_key: &str,
    ) -> Result<PhotoAsset, AppError> {
        let row: Option<PhotoRow> = sqlx::query_as::<Postgres, PhotoRow>(&format!(
            "UPDATE tphoto SET filename = $2, icon_filename = $3 WHERE id = $1 RETURNING {}",
            PHOTO_COLUMNS
        ))
        .bind(photo_id)
        .bind(main_key)
        .bind(thumbnail_key)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound(format!("Photo {} not found", photo_id)))?
            .to_photo_asset()
    }

    /// Move a row from `from` to `to`. Returns false when the row is missing
    /// or not currently in `from`.
    #[tracing::instrument(skip(self), fields(db.table = "tphoto", db.operation = "update", db.record_id = photo_id))]
    pub async fn transition(
        &self,
        photo_id: i64,
        from: LifecycleFlag,
        to: LifecycleFlag,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE tphoto SET deleted_ind = $3 WHERE id = $1 AND deleted_ind = $2",
        )
        .bind(photo_id)
        .bind(from.code())
        .bind(to.code())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Physically remove a row. Only saga rollback calls this.
    #[tracing::instrument(skip(self), fields(db.table = "tphoto", db.operation = "delete", db.record_id = photo_id))]
    pub async fn hard_delete(&self, photo_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tphoto WHERE id = $1")
            .bind(photo_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Overwrite the allow-listed descriptive fields of an active row.
    /// Fields absent from `update` keep their value.
    #[tracing::instrument(skip(self, update), fields(db.table = "tphoto", db.operation = "update", db.record_id = photo_id))]
    pub async fn update_metadata(
        &self,
        photo_id: i64,
        update: &PhotoMetadataUpdate,
    ) -> Result<Option<PhotoAsset>, AppError> {
        let row: Option<PhotoRow> = sqlx::query_as::<Postgres, PhotoRow>(&format!(
            r#"
            UPDATE tphoto
            SET name = COALESCE($2, name),
                text_desc = COALESCE($3, text_desc),
                public_ind = COALESCE($4, public_ind)
            WHERE id = $1 AND deleted_ind = 'N'
            RETURNING {}
            "#,
            PHOTO_COLUMNS
        ))
        .bind(photo_id)
        .bind(update.caption.as_deref())
        .bind(update.text_desc.as_deref())
        .bind(update.license.map(|l| l.code()))
        .fetch_optional(&self.pool)
        .await?;

        row.map(PhotoRow::to_photo_asset).transpose()
    }

    /// Fetch a row by id, whatever its lifecycle flag.
    #[tracing::instrument(skip(self), fields(db.table = "tphoto", db.operation = "select", db.record_id = photo_id))]
    pub async fn get_by_id(&self, photo_id: i64) -> Result<Option<PhotoAsset>, AppError> {
        let row: Option<PhotoRow> = sqlx::query_as::<Postgres, PhotoRow>(&format!(
            "SELECT {} FROM tphoto WHERE id = $1",
            PHOTO_COLUMNS
        ))
        .bind(photo_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PhotoRow::to_photo_asset).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> PhotoRow {
        PhotoRow {
            id: 42,
            tlog_id: 7,
            server_id: 1,
            photo_type: "T".to_string(),
            filename: "000/P00042.jpg".to_string(),
            filesize: 1000,
            height: 300,
            width: 400,
            icon_filename: "000/I00042.jpg".to_string(),
            icon_filesize: 100,
            icon_height: 90,
            icon_width: 120,
            name: "Pillar".to_string(),
            text_desc: String::new(),
            ip_addr: "127.0.0.1".to_string(),
            public_ind: "Y".to_string(),
            deleted_ind: "N".to_string(),
            source: "F".to_string(),
            crt_timestamp: Utc::now(),
        }
    }

    #[test]
    fn row_maps_to_domain() {
        let asset = row().to_photo_asset().unwrap();
        assert_eq!(asset.id, 42);
        assert_eq!(asset.log_id, 7);
        assert_eq!(asset.photo_type, PhotoType::Trigpoint);
        assert_eq!(asset.main.key, "000/P00042.jpg");
        assert_eq!(asset.thumbnail.width, 120);
        assert_eq!(asset.visibility, Visibility::PublicDomain);
        assert!(asset.is_active());
        assert!(!asset.is_placeholder());
    }

    #[test]
    fn padded_char_codes_are_accepted() {
        let mut row = row();
        row.deleted_ind = "M ".to_string();
        let asset = row.to_photo_asset().unwrap();
        assert_eq!(asset.lifecycle, LifecycleFlag::Moderated);
    }

    #[test]
    fn corrupt_codes_are_internal_errors() {
        let mut row = row();
        row.source = "Z".to_string();
        assert!(matches!(row.to_photo_asset(), Err(AppError::Internal(_))));
    }
}
