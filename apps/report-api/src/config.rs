use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

#[derive(Clone, Debug)]
pub struct ReportConfig {
    pub database_url: String,
    pub bind_host: String,
    pub bind_port: u16,
    pub dataset: Option<String>,
    pub table: Option<String>,
}

impl ReportConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let database_url = env::var("REPORT_DATABASE_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .context("REPORT_DATABASE_URL or DATABASE_URL is required")?;

        let bind_host = env::var("REPORT_BIND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let bind_port = env::var("REPORT_BIND_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);

        // Missing dataset/table is reported by the first query, not at boot.
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
            bind_host,
            bind_port,
            dataset,
            table,
        })
    }
}
