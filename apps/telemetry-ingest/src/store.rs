use crate::event::TelemetryEvent;
use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
    #[error("store misconfigured: {0}")]
    Misconfigured(String),
}

pub async fn build_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub fn valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// Both values are interpolated into SQL, so anything beyond plain
// identifier characters counts as a misconfiguration.
pub fn qualified_relation(
    dataset: Option<&str>,
    table: Option<&str>,
) -> Result<String, StoreError> {
    let dataset = dataset
        .ok_or_else(|| StoreError::Misconfigured("TELEMETRY_DATASET is not set".to_string()))?;
    let table = table
        .ok_or_else(|| StoreError::Misconfigured("TELEMETRY_TABLE is not set".to_string()))?;
    if !valid_identifier(dataset) {
        return Err(StoreError::Misconfigured(format!(
            "invalid dataset name {dataset:?}"
        )));
    }
    if !valid_identifier(table) {
        return Err(StoreError::Misconfigured(format!(
            "invalid table name {table:?}"
        )));
    }
    Ok(format!("{dataset}.{table}"))
}

// One row per device, overwritten whole on every accepted event.
#[derive(Clone)]
pub struct CurrentStateStore {
    pool: PgPool,
}

impl CurrentStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, event: &TelemetryEvent) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO device_state (device_id, humidity, pump_active, light_active, last_timestamp)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (device_id) DO UPDATE
            SET humidity = EXCLUDED.humidity,
                pump_active = EXCLUDED.pump_active,
                light_active = EXCLUDED.light_active,
                last_timestamp = EXCLUDED.last_timestamp
            "#,
        )
        .bind(&event.device_id)
        .bind(event.humidity)
        .bind(event.pump_active)
        .bind(event.light_active)
        .bind(event.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// Append-only history. The target relation comes from deployment
// configuration and is resolved on first use; redelivered events may
// append duplicates.
#[derive(Clone)]
pub struct RawEventStore {
    pool: PgPool,
    dataset: Option<String>,
    table: Option<String>,
}

impl RawEventStore {
    pub fn new(pool: PgPool, dataset: Option<String>, table: Option<String>) -> Self {
        Self {
            pool,
            dataset,
            table,
        }
    }

    fn relation(&self) -> Result<String, StoreError> {
        qualified_relation(self.dataset.as_deref(), self.table.as_deref())
    }

    pub async fn append(&self, event: &TelemetryEvent) -> Result<(), StoreError> {
        let relation = self.relation()?;
        let sql = format!(
            "INSERT INTO {relation} (device_id, humidity, pump_active, light_active, ts) \
             VALUES ($1, $2, $3, $4, $5)"
        );
        sqlx::query(&sql)
            .bind(&event.device_id)
            .bind(event.humidity)
            .bind(event.pump_active)
            .bind(event.light_active)
            .bind(event.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
