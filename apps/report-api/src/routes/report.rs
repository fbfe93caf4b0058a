use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::any;
use axum::{Json, Router};
use chrono::{DateTime, Utc};

use crate::error::internal_error;
use crate::state::AppState;

// Hour buckets are truncated in this fixed zone; the window is always the
// trailing seven days as of query execution.
const REPORT_TIMEZONE: &str = "Europe/Zurich";

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub(crate) struct ReportRow {
    date_hour: DateTime<Utc>,
    avg_hum: f64,
    min_hum: f64,
    max_hum: f64,
    data_points: i64,
}

fn valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// Dataset/table are interpolated into the query text, so they must be plain
// identifiers; anything else is a deployment mistake.
fn qualified_relation(dataset: Option<&str>, table: Option<&str>) -> Result<String, String> {
    let dataset = dataset.ok_or_else(|| "TELEMETRY_DATASET is not set".to_string())?;
    let table = table.ok_or_else(|| "TELEMETRY_TABLE is not set".to_string())?;
    if !valid_identifier(dataset) {
        return Err(format!("invalid dataset name {dataset:?}"));
    }
    if !valid_identifier(table) {
        return Err(format!("invalid table name {table:?}"));
    }
    Ok(format!("{dataset}.{table}"))
}

fn report_query(relation: &str) -> String {
    format!(
        r#"
        SELECT
            date_trunc('hour', ts, '{REPORT_TIMEZONE}') AS date_hour,
            avg(humidity) AS avg_hum,
            min(humidity) AS min_hum,
            max(humidity) AS max_hum,
            count(*) AS data_points
        FROM {relation}
        WHERE ts BETWEEN now() - interval '7 days' AND now()
        GROUP BY date_hour
        ORDER BY date_hour
        "#
    )
}

pub(crate) async fn report_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReportRow>>, (StatusCode, String)> {
    let relation = qualified_relation(
        state.config.dataset.as_deref(),
        state.config.table.as_deref(),
    )
    .map_err(internal_error)?;

    let rows: Vec<ReportRow> = sqlx::query_as(&report_query(&relation))
        .fetch_all(&state.db)
        .await
        .map_err(internal_error)?;

    Ok(Json(rows))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/report", any(report_handler))
}
