//! order-server binary

use order_server::config::BoxError;
use order_server::logger::init_logger;
use order_server::{AppState, Config, build_app};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    init_logger(&config.log_level, config.log_dir.as_deref());

    tracing::info!(
        environment = %config.environment,
        port = config.http_port,
        generator = config.content_generator.is_some(),
        "Starting order-server"
    );

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let state = AppState::new(config).await?;
    let app = build_app(state.clone());

    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("order-server HTTP listening on {http_addr}");

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received");
        signal.cancel();
    });

    // Live sessions must be closed for graceful shutdown to finish
    let registry = state.registry.clone();
    let token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            token.cancelled().await;
            registry.shutdown();
        })
        .await?;

    state.shutdown().await;
    tracing::info!("order-server stopped");
    Ok(())
}
