use crate::AppState;
use crate::api::response::{ApiResult, ok};
use axum::extract::State;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub provider: String,
    pub provider_status: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service is running", body = ServiceInfo)
    ),
    tag = "system"
)]
pub async fn root() -> ApiResult<ServiceInfo> {
    ok(
        "Malware scan backend is running",
        ServiceInfo {
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    )
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    let database = if state.db.ping().await.is_ok() {
        "connected"
    } else {
        "disconnected"
    };

    let provider_status = if state.provider.health_check().await {
        "reachable"
    } else {
        "unreachable"
    };

    let status = if database == "connected" { "ok" } else { "degraded" };

    ok(
        "Health check",
        HealthResponse {
            status: status.to_string(),
            database: database.to_string(),
            provider: state.provider.name().to_string(),
            provider_status: provider_status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    )
}
