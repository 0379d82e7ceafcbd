use textlens::config::AppConfig;
use textlens::{logging, server, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(?config, "starting textlens");

    server::serve(config, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
