use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use confd_server::config::{Cli, Settings};
use confd_server::logging::{log_welcome, setup_logging, LoggingConfig};
use confd_server::startup;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;

    let logging = LoggingConfig::from_settings(&settings.logging)?;
    setup_logging(&logging)?;
    log_welcome(&logging.app_name, env!("CARGO_PKG_VERSION"));

    let app = startup::build(&settings).await?;

    let listener = TcpListener::bind((settings.server.host.as_str(), settings.server.port)).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app.router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    app.store.close().await;
    info!("Stopped");
    Ok(())
}
