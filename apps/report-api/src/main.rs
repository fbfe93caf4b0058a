mod config;
mod db;
mod error;
mod routes;
mod state;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

async fn bind_listener(addr: &str) -> Result<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Failed to bind report-api listener on {addr}: port already in use. Stop the other service using this port or set REPORT_BIND_PORT to choose another port.",
            );
        }
        Err(err) => {
            Err(err).with_context(|| format!("failed to bind report-api listener on {addr}"))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = config::ReportConfig::from_env()?;
    let pool = db::connect_lazy(&config.database_url)?;

    let state = state::AppState {
        config: config.clone(),
        db: pool,
    };
    let app = routes::router(state);

    let addr = format!("{}:{}", config.bind_host, config.bind_port);
    let listener = bind_listener(&addr).await?;
    tracing::info!(%addr, "report-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
