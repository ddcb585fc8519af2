//! Trigpics HTTP API
//!
//! Thin axum layer over the photo lifecycle: extracts the caller identity
//! and request bodies, then renders results and `AppError`s as JSON.

pub mod api_doc;
pub mod auth;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;
pub mod utils;

pub use setup::routes::setup_routes;
pub use state::AppState;
