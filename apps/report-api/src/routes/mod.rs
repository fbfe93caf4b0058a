pub mod health;
pub mod report;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    // The report is world-readable: any origin may fetch it.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::router())
        .nest("/api", Router::new().merge(report::router()))
        .layer(cors)
        .with_state(state)
}
