use crate::event::TelemetryEvent;
use crate::handler::{IngestionHandler, Outcome};
use crate::store::{CurrentStateStore, RawEventStore, StoreError};
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::env;

// These tests need a live Postgres; they are skipped unless
// INGEST_INTEGRATION_TEST=1 and INGEST_TEST_DATABASE_URL are set.
fn integration_database_url() -> Option<String> {
    if env::var("INGEST_INTEGRATION_TEST").ok().as_deref() != Some("1") {
        return None;
    }
    env::var("INGEST_TEST_DATABASE_URL").ok()
}

async fn setup_test_pool(database_url: &str, schema: &str) -> Result<PgPool> {
    let admin_pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await?;
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
        .execute(&admin_pool)
        .await?;
    drop(admin_pool);

    let schema_name = schema.to_string();
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .after_connect(move |conn, _meta| {
            let schema = schema_name.clone();
            Box::pin(async move {
                sqlx::query(&format!("SET search_path TO {}", schema))
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS device_state (
            device_id text primary key,
            humidity double precision not null,
            pump_active boolean not null,
            light_active boolean not null,
            last_timestamp timestamptz not null
        )
        "#,
    )
    .execute(&pool)
    .await?;
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS telemetry_events (
            device_id text not null,
            humidity double precision not null,
            pump_active boolean not null,
            light_active boolean not null,
            ts timestamptz not null
        )
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

fn test_handler(pool: &PgPool, schema: &str) -> IngestionHandler {
    let state_store = CurrentStateStore::new(pool.clone());
    let raw_store = RawEventStore::new(
        pool.clone(),
        Some(schema.to_string()),
        Some("telemetry_events".to_string()),
    );
    IngestionHandler::new(state_store, raw_store)
}

fn event(device_id: &str, humidity: f64, timestamp: DateTime<Utc>) -> TelemetryEvent {
    TelemetryEvent {
        device_id: device_id.to_string(),
        humidity,
        pump_active: true,
        light_active: false,
        timestamp,
    }
}

async fn state_row_count(pool: &PgPool, device_id: &str) -> Result<i64> {
    let row = sqlx::query("SELECT count(*) AS n FROM device_state WHERE device_id = $1")
        .bind(device_id)
        .fetch_one(pool)
        .await?;
    Ok(row.try_get::<i64, _>("n")?)
}

async fn raw_row_count(pool: &PgPool, device_id: &str) -> Result<i64> {
    let row = sqlx::query("SELECT count(*) AS n FROM telemetry_events WHERE device_id = $1")
        .bind(device_id)
        .fetch_one(pool)
        .await?;
    Ok(row.try_get::<i64, _>("n")?)
}

#[tokio::test]
async fn rejected_event_writes_nothing_and_settles() -> Result<()> {
    let Some(database_url) = integration_database_url() else {
        return Ok(());
    };
    let schema = format!("ingest_test_reject_{}", std::process::id());
    let pool = setup_test_pool(&database_url, &schema).await?;
    let handler = test_handler(&pool, &schema);

    for humidity in [150.0, -0.1, 100.1] {
        let outcome = handler
            .handle(&event("d1", humidity, Utc::now()))
            .await?;
        assert_eq!(outcome, Outcome::Rejected);
    }

    assert_eq!(state_row_count(&pool, "d1").await?, 0);
    assert_eq!(raw_row_count(&pool, "d1").await?, 0);
    Ok(())
}

#[tokio::test]
async fn accepted_event_writes_both_stores_with_matching_fields() -> Result<()> {
    let Some(database_url) = integration_database_url() else {
        return Ok(());
    };
    let schema = format!("ingest_test_accept_{}", std::process::id());
    let pool = setup_test_pool(&database_url, &schema).await?;
    let handler = test_handler(&pool, &schema);

    let timestamp = Utc.with_ymd_and_hms(2026, 8, 1, 9, 30, 0).unwrap();
    let outcome = handler.handle(&event("d1", 55.0, timestamp)).await?;
    assert_eq!(outcome, Outcome::Accepted);

    let state = sqlx::query(
        "SELECT humidity, pump_active, light_active, last_timestamp FROM device_state WHERE device_id = $1",
    )
    .bind("d1")
    .fetch_one(&pool)
    .await?;
    assert_eq!(state.try_get::<f64, _>("humidity")?, 55.0);
    assert!(state.try_get::<bool, _>("pump_active")?);
    assert!(!state.try_get::<bool, _>("light_active")?);
    // The record carries the transport-assigned receipt time.
    assert_eq!(
        state.try_get::<DateTime<Utc>, _>("last_timestamp")?,
        timestamp
    );

    assert_eq!(raw_row_count(&pool, "d1").await?, 1);
    let raw = sqlx::query(
        "SELECT humidity, pump_active, light_active, ts FROM telemetry_events WHERE device_id = $1",
    )
    .bind("d1")
    .fetch_one(&pool)
    .await?;
    assert_eq!(raw.try_get::<f64, _>("humidity")?, 55.0);
    assert!(raw.try_get::<bool, _>("pump_active")?);
    assert!(!raw.try_get::<bool, _>("light_active")?);
    assert_eq!(raw.try_get::<DateTime<Utc>, _>("ts")?, timestamp);
    Ok(())
}

#[tokio::test]
async fn boundary_humidity_values_are_accepted() -> Result<()> {
    let Some(database_url) = integration_database_url() else {
        return Ok(());
    };
    let schema = format!("ingest_test_boundary_{}", std::process::id());
    let pool = setup_test_pool(&database_url, &schema).await?;
    let handler = test_handler(&pool, &schema);

    assert_eq!(
        handler.handle(&event("lo", 0.0, Utc::now())).await?,
        Outcome::Accepted
    );
    assert_eq!(
        handler.handle(&event("hi", 100.0, Utc::now())).await?,
        Outcome::Accepted
    );
    assert_eq!(raw_row_count(&pool, "lo").await?, 1);
    assert_eq!(raw_row_count(&pool, "hi").await?, 1);
    Ok(())
}

#[tokio::test]
async fn redelivery_converges_state_and_duplicates_history() -> Result<()> {
    let Some(database_url) = integration_database_url() else {
        return Ok(());
    };
    let schema = format!("ingest_test_redelivery_{}", std::process::id());
    let pool = setup_test_pool(&database_url, &schema).await?;
    let handler = test_handler(&pool, &schema);

    let timestamp = Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap();
    let delivered = event("d1", 42.0, timestamp);
    handler.handle(&delivered).await?;
    handler.handle(&delivered).await?;

    // Last-writer-wins upsert: one identical record either way.
    assert_eq!(state_row_count(&pool, "d1").await?, 1);
    let state = sqlx::query("SELECT humidity, last_timestamp FROM device_state WHERE device_id = $1")
        .bind("d1")
        .fetch_one(&pool)
        .await?;
    assert_eq!(state.try_get::<f64, _>("humidity")?, 42.0);
    assert_eq!(
        state.try_get::<DateTime<Utc>, _>("last_timestamp")?,
        timestamp
    );

    // The append is not idempotent: a duplicate raw row is the accepted
    // cost of at-least-once delivery.
    assert_eq!(raw_row_count(&pool, "d1").await?, 2);
    Ok(())
}

#[tokio::test]
async fn unconfigured_raw_store_fails_on_first_use() -> Result<()> {
    let Some(database_url) = integration_database_url() else {
        return Ok(());
    };
    let schema = format!("ingest_test_misconfig_{}", std::process::id());
    let pool = setup_test_pool(&database_url, &schema).await?;
    let raw_store = RawEventStore::new(pool, None, None);

    let result = raw_store.append(&event("d1", 50.0, Utc::now())).await;
    assert!(matches!(result, Err(StoreError::Misconfigured(_))));
    Ok(())
}
