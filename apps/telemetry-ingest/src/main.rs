mod config;
mod event;
mod handler;
mod mqtt;
mod store;

#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::handler::IngestionHandler;
use crate::store::{CurrentStateStore, RawEventStore};
use anyhow::Result;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,telemetry_ingest=info".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing();

    let pool = store::build_pool(&config.database_url, config.db_pool_size).await?;
    let state_store = CurrentStateStore::new(pool.clone());
    let raw_store = RawEventStore::new(pool, config.dataset.clone(), config.table.clone());
    let handler = IngestionHandler::new(state_store, raw_store);

    let listener = tokio::spawn(mqtt::run_listener(config, handler));

    tokio::select! {
        res = listener => {
            match res {
                Ok(Ok(())) => tracing::info!("MQTT listener exited"),
                Ok(Err(err)) => tracing::error!(error=%err, "MQTT listener failed"),
                Err(err) => tracing::error!(error=%err, "MQTT listener task panicked"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
