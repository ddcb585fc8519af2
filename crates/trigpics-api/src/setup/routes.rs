//! Route configuration and setup

use crate::api_doc::openapi_json;
use crate::constants::{API_PREFIX, LOCAL_PHOTOS_PATH};
use crate::handlers::{health, photos};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

const DEFAULT_HTTP_CONCURRENCY_LIMIT: usize = 1024;

/// Build the application router.
pub fn setup_routes(state: Arc<AppState>) -> Router {
    let photo_routes = Router::new()
        .route("/photos", post(photos::create_photo))
        .route(
            "/photos/{id}",
            get(photos::get_photo)
                .patch(photos::update_photo)
                .delete(photos::delete_photo),
        )
        .route("/photos/{id}/rotate", post(photos::rotate_photo))
        .route("/photos/{id}/evaluate", get(photos::evaluate_photo))
        .route("/openapi.json", get(openapi_json));

    let mut app = Router::new()
        .route("/health", get(health::health_check))
        .nest(API_PREFIX, photo_routes);

    if let Some(dir) = &state.local_photos_dir {
        tracing::info!(path = %dir.display(), "Serving local photo storage at {}", LOCAL_PHOTOS_PATH);
        app = app.nest_service(LOCAL_PHOTOS_PATH, ServeDir::new(dir));
    }

    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_HTTP_CONCURRENCY_LIMIT)
        .max(1);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    app.layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
