//! OpenAPI documentation, served at `/api/v1/openapi.json`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use trigpics_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trigpics Photo API",
        version = "0.1.0",
        description = "Upload, rotate, update and delete trigpoint log photos. Every photo is stored as a main image and a thumbnail; mutating routes expect the caller identity in X-User-Id and X-User-Admin."
    ),
    paths(
        handlers::photos::create_photo,
        handlers::photos::get_photo,
        handlers::photos::update_photo,
        handlers::photos::delete_photo,
        handlers::photos::rotate_photo,
        handlers::photos::evaluate_photo,
        handlers::health::health_check,
    ),
    components(schemas(
        models::PhotoView,
        models::PhotoVerification,
        models::PhotoMetadataUpdate,
        models::PhotoType,
        models::Visibility,
        handlers::photos::RotateRequest,
        handlers::photos::PhotoUploadForm,
        handlers::health::HealthCheckResponse,
        error::ErrorResponse,
    )),
    tags(
        (name = "photos", description = "Photo lifecycle"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> axum::Json<utoipa::openapi::OpenApi> {
    axum::Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_photo_route_is_documented() {
        let spec = ApiDoc::openapi();
        for path in [
            "/api/v1/photos",
            "/api/v1/photos/{id}",
            "/api/v1/photos/{id}/rotate",
            "/api/v1/photos/{id}/evaluate",
            "/health",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
