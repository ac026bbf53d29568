use crate::app_state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    environment: String,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    system_info: SystemInfo,
}

#[derive(Deserialize)]
pub struct HealthQuery {
    mode: Option<String>,
}

/// Responds with the health status of the server.
///
/// - By default (no query parameters), performs a light check to confirm the web server
///   is running.
///
/// - If `mode=full` is passed as a query parameter, also pings the store to verify
///   database connectivity.
///
/// # Responses
/// - `200 OK` with `{"status": "available", "system_info": {...}}` when healthy.
/// - `500 INTERNAL SERVER ERROR` with `"status": "error"` if the store ping fails in
///   full mode.
///
/// # Examples
/// - `GET /v1/healthcheck` → 200 OK
/// - `GET /v1/healthcheck?mode=full` → 200 OK or 500 INTERNAL SERVER ERROR
pub async fn health_check(
    State(state): State<AppState>,
    Query(params): Query<HealthQuery>,
) -> (StatusCode, Json<HealthResponse>) {
    // ---
    let system_info = SystemInfo {
        environment: state.environment().to_string(),
        version: env!("CARGO_PKG_VERSION"),
    };

    if params.mode.as_deref() == Some("full") {
        if let Err(err) = state.repository().ping().await {
            tracing::error!(error = %err, "health check: store ping failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    status: "error",
                    system_info,
                }),
            );
        }
    }

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "available",
            system_info,
        }),
    )
}
