use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_pool_size: u32,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_topic_prefix: String,
    pub mqtt_keepalive_secs: u64,
    pub mqtt_client_id: String,
    pub dataset: Option<String>,
    pub table: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let database_url = env::var("INGEST_DATABASE_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .context("INGEST_DATABASE_URL or DATABASE_URL is required")?;

        let mqtt_host = env::var("INGEST_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = env::var("INGEST_MQTT_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(1883);
        let mqtt_username = env::var("INGEST_MQTT_USERNAME").ok();
        let mqtt_password = env::var("INGEST_MQTT_PASSWORD").ok();
        let mqtt_topic_prefix =
            env::var("INGEST_MQTT_TOPIC_PREFIX").unwrap_or_else(|_| "greenhouse".to_string());
        let mqtt_keepalive_secs = env::var("INGEST_MQTT_KEEPALIVE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);
        let mqtt_client_id = env::var("INGEST_MQTT_CLIENT_ID")
            .unwrap_or_else(|_| format!("telemetry-ingest-{}", std::process::id()));

        let db_pool_size = env::var("INGEST_DB_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);

        // Dataset/table stay optional here: a missing value is a deployment
        // mistake surfaced by the raw event store on first use, not at boot.
        let dataset = env::var("TELEMETRY_DATASET")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let table = env::var("TELEMETRY_TABLE")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(Self {
            database_url,
            db_pool_size,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_topic_prefix,
            mqtt_keepalive_secs,
            mqtt_client_id,
            dataset,
            table,
        })
    }

    pub fn mqtt_keepalive(&self) -> Duration {
        Duration::from_secs(self.mqtt_keepalive_secs)
    }
}
