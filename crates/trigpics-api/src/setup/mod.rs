//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::Result;
use std::sync::Arc;
use trigpics_core::Config;
use trigpics_services::ModerationWorkerPool;

/// Everything the server needs, plus what must be shut down after it
pub struct App {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    pub moderation: Arc<ModerationWorkerPool>,
}

/// Initialize the entire application: telemetry, database, services, routes.
pub async fn initialize_app(config: &Config) -> Result<App> {
    crate::telemetry::init_telemetry(config.log_format())?;

    tracing::info!(
        environment = %config.environment(),
        storage_backend = ?config.storage_backend(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(config).await?;
    let services = services::initialize_services(config, pool).await?;
    let router = routes::setup_routes(services.state.clone());

    Ok(App {
        state: services.state,
        router,
        moderation: services.moderation,
    })
}
