use anyhow::Context;
use survey_plugin_host::{utils::config::Settings, utils::logging::init_logging, Application};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let settings = Settings::new().context("failed to load configuration")?;

    // Flushes buffered log lines on drop; keep it until main returns.
    let _log_guard = init_logging(&settings.log).context("failed to initialize logging")?;

    info!("Starting survey plugin host v{}", env!("CARGO_PKG_VERSION"));

    let app = Application::new(settings);

    app.start().await.map_err(|e| {
        error!("Failed to start application: {}", e);
        e
    })?;

    info!("Application started successfully");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                let _ = shutdown_tx.send(());
            }
            Err(err) => {
                error!("Failed to listen for shutdown signal: {}", err);
            }
        }
    });

    let _ = shutdown_rx.await;

    if let Err(e) = app.shutdown().await {
        error!("Error during shutdown: {}", e);
    }

    Ok(())
}
