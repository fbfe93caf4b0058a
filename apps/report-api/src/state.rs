use crate::config::ReportConfig;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub config: ReportConfig,
    pub db: PgPool,
}
