use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database_ready: bool,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_ready = state.store.ping().await.is_ok();

    Json(HealthResponse {
        status: if database_ready { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database_ready,
    })
}
