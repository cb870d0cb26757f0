use anyhow::Context;
use tracing::{error, info};

use livebell::logging::init_logging;
use livebell::services::ServiceContainer;
use livebell::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let logging =
        init_logging(config.log_dir.as_deref()).context("failed to initialize logging")?;

    helix_client::install_rustls_provider();

    info!(config = ?config, "Starting livebell v{}", env!("CARGO_PKG_VERSION"));

    let container = ServiceContainer::new(config)?;
    logging.start_retention_cleanup(container.cancellation_token());

    if let Err(e) = container.start().await {
        error!(error = %e, "Startup failed");
        container.shutdown().await;
        return Err(e).context("failed to start services");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    container.shutdown().await;
    Ok(())
}
