//! Liveness endpoint

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let health = state.services.health_check().await;

    let status = if health.is_healthy() {
        StatusCode::OK
    } else {
        for issue in health.get_issues() {
            tracing::warn!(issue = %issue, "Health check issue");
        }
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = HealthResponse {
        status: if health.is_healthy() { "healthy" } else { "unhealthy" }.to_string(),
        database: if health.database_healthy {
            format!("connected ({})", health.storage_backend)
        } else {
            "disconnected".to_string()
        },
        cache: if health.cache_healthy {
            format!("connected ({})", health.cache_backend)
        } else {
            "disconnected".to_string()
        },
        version: state.settings.app.version.clone(),
    };
    (status, Json(body))
}
