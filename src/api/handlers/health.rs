use crate::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub storage: String,
    /// Retired files still waiting for deletion.
    pub cleanup_pending: usize,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "All dependencies reachable", body = HealthResponse),
        (status = 503, description = "Database or asset store unavailable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.db.ping().await.is_ok();
    let storage_ok = match state.store.check_writable().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Asset store not writable: {}", e);
            false
        }
    };

    let status = if db_ok && storage_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let label = |ok: bool, good: &str, bad: &str| (if ok { good } else { bad }).to_string();

    (
        status,
        Json(HealthResponse {
            status: label(db_ok && storage_ok, "ok", "degraded"),
            database: label(db_ok, "connected", "disconnected"),
            storage: label(storage_ok, "writable", "unavailable"),
            cleanup_pending: state.cleaner.pending(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
