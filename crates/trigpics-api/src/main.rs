use trigpics_api::setup;
use trigpics_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let app = setup::initialize_app(&config).await?;
    let served = setup::server::start_server(&config, app.router).await;

    app.moderation.shutdown().await;
    if let Some(pool) = &app.state.db_pool {
        pool.close().await;
    }
    tracing::info!("Shutdown complete");

    served
}
