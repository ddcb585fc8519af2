//! Photo handlers: upload, read, metadata update, delete, rotate and evaluate.

use crate::auth::RequestActor;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use crate::utils::ClientIp;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use trigpics_core::models::{
    PhotoMetadataUpdate, PhotoSubmission, PhotoType, PhotoVerification, PhotoView, Visibility,
};
use trigpics_core::AppError;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct CreatePhotoQuery {
    /// Log the photo is attached to
    pub log_id: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RotateRequest {
    /// Clockwise rotation in degrees: 90, 180 or 270
    pub angle: i32,
}

/// Multipart body of an upload, as documented in the OpenAPI schema
#[allow(dead_code)]
#[derive(Deserialize, ToSchema)]
pub struct PhotoUploadForm {
    #[schema(format = Binary, value_type = String)]
    pub file: Vec<u8>,
    pub caption: String,
    pub text_desc: Option<String>,
    #[serde(rename = "type")]
    pub photo_type: PhotoType,
    pub license: Visibility,
}

#[derive(Default)]
struct UploadFields {
    file: Option<Bytes>,
    caption: Option<String>,
    text_desc: Option<String>,
    photo_type: Option<String>,
    license: Option<String>,
}

impl UploadFields {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut fields = UploadFields::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Invalid multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let invalid = |e: MultipartError| {
                AppError::InvalidInput(format!("Failed to read field {}: {}", name, e))
            };

            match name.as_str() {
                "file" => fields.file = Some(field.bytes().await.map_err(invalid)?),
                "caption" => fields.caption = Some(field.text().await.map_err(invalid)?),
                "text_desc" => fields.text_desc = Some(field.text().await.map_err(invalid)?),
                "type" => fields.photo_type = Some(field.text().await.map_err(invalid)?),
                "license" => fields.license = Some(field.text().await.map_err(invalid)?),
                other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
            }
        }

        Ok(fields)
    }

    fn into_submission(
        self,
        log_id: i64,
        client_ip: Option<String>,
    ) -> Result<(PhotoSubmission, Bytes), AppError> {
        let file = self
            .file
            .filter(|f| !f.is_empty())
            .ok_or_else(|| missing("file"))?;
        let photo_type = self.photo_type.ok_or_else(|| missing("type"))?;
        let license = self.license.ok_or_else(|| missing("license"))?;

        let submission = PhotoSubmission {
            log_id,
            caption: self.caption.ok_or_else(|| missing("caption"))?,
            text_desc: self.text_desc.unwrap_or_default(),
            photo_type: photo_type.parse()?,
            license: license.parse()?,
            client_ip,
        };

        Ok((submission, file))
    }
}

fn missing(field: &str) -> AppError {
    AppError::InvalidInput(format!("Missing multipart field: {}", field))
}

#[utoipa::path(
    post,
    path = "/api/v1/photos",
    tag = "photos",
    params(CreatePhotoQuery),
    request_body(content = PhotoUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Photo created", body = PhotoView),
        (status = 400, description = "Invalid submission or image", body = ErrorResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
        (status = 403, description = "Caller does not own the log", body = ErrorResponse),
        (status = 404, description = "Log not found", body = ErrorResponse),
        (status = 502, description = "Object store unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip_all,
    fields(user_id = actor.user_id, log_id = query.log_id, operation = "create_photo")
)]
pub async fn create_photo(
    State(state): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Query(query): Query<CreatePhotoQuery>,
    ClientIp(client_ip): ClientIp,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let (submission, image) =
        UploadFields::read(multipart).await?.into_submission(query.log_id, client_ip)?;

    let view = state
        .lifecycle
        .create_photo(actor, submission, image)
        .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

#[utoipa::path(
    get,
    path = "/api/v1/photos/{id}",
    tag = "photos",
    params(("id" = i64, Path, description = "Photo ID")),
    responses(
        (status = 200, description = "Photo found", body = PhotoView),
        (status = 404, description = "Photo not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "get_photo"))]
pub async fn get_photo(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<PhotoView>, HttpAppError> {
    Ok(Json(state.lifecycle.get_photo(id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/photos/{id}",
    tag = "photos",
    params(("id" = i64, Path, description = "Photo ID")),
    request_body = PhotoMetadataUpdate,
    responses(
        (status = 200, description = "Metadata updated", body = PhotoView),
        (status = 400, description = "Invalid update", body = ErrorResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 404, description = "Photo not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip_all,
    fields(user_id = actor.user_id, photo_id = id, operation = "update_photo")
)]
pub async fn update_photo(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    ValidatedJson(update): ValidatedJson<PhotoMetadataUpdate>,
) -> Result<Json<PhotoView>, HttpAppError> {
    let view = state
        .lifecycle
        .update_photo_metadata(actor, id, update)
        .await?;
    Ok(Json(view))
}

#[utoipa::path(
    delete,
    path = "/api/v1/photos/{id}",
    tag = "photos",
    params(("id" = i64, Path, description = "Photo ID")),
    responses(
        (status = 204, description = "Photo deleted"),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 404, description = "Photo not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip_all,
    fields(user_id = actor.user_id, photo_id = id, operation = "delete_photo")
)]
pub async fn delete_photo(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
) -> Result<StatusCode, HttpAppError> {
    state.lifecycle.delete_photo(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/photos/{id}/rotate",
    tag = "photos",
    params(("id" = i64, Path, description = "Photo ID")),
    request_body = RotateRequest,
    responses(
        (status = 200, description = "Rotated revision", body = PhotoView),
        (status = 400, description = "Unsupported angle", body = ErrorResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 404, description = "Photo not found", body = ErrorResponse),
        (status = 500, description = "Rollback incomplete", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip_all,
    fields(user_id = actor.user_id, photo_id = id, angle = request.angle, operation = "rotate_photo")
)]
pub async fn rotate_photo(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    ValidatedJson(request): ValidatedJson<RotateRequest>,
) -> Result<Json<PhotoView>, HttpAppError> {
    let view = state
        .lifecycle
        .rotate_photo(actor, id, request.angle)
        .await?;
    Ok(Json(view))
}

#[utoipa::path(
    get,
    path = "/api/v1/photos/{id}/evaluate",
    tag = "photos",
    params(("id" = i64, Path, description = "Photo ID")),
    responses(
        (status = 200, description = "Verification report", body = PhotoVerification),
        (status = 404, description = "Photo not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "evaluate_photo"))]
pub async fn evaluate_photo(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<PhotoVerification>, HttpAppError> {
    Ok(Json(state.lifecycle.verify_photo(id).await?))
}
