/*!
 * # Health Check Module
 *
 * - Basic health check (`/health`) - process is up
 * - Readiness check (`/health/ready`) - the requirement store answers
 * - Version (`/health/version`) - build information
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, error};

use crate::AppState;

/// Basic health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    summary = "Liveness",
    responses((status = 200, description = "Service is up")),
    tag = "health"
)]
pub async fn health_check() -> impl IntoResponse {
    debug!("Health check endpoint called");

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/health/ready",
    summary = "Readiness",
    responses(
        (status = 200, description = "Store reachable"),
        (status = 503, description = "Store unreachable"),
    ),
    tag = "health"
)]
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let (store, ready) = match state.db.as_deref() {
        None => ("memory", true),
        Some(db) => match crate::db::check_connection(db).await {
            Ok(()) => ("database", true),
            Err(e) => {
                error!("Database readiness check failed: {}", e);
                ("database", false)
            }
        },
    };

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "ready": ready,
            "store": store,
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
}

/// Returns build and version information
pub async fn version_info() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Routes nested under `/health`.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/version", get(version_info))
}
