use anyhow::Context;

use turnstile_api::app;
use turnstile_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    turnstile_observability::init();

    let config = ApiConfig::from_env()?;
    let state = app::services::build_services(&config).await?;
    let router = app::build_app(state.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    state.auth.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
