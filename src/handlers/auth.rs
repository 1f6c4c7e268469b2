//! Account handlers: registration, login, profile and the bootstrap endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::error::{ApiResult, HttpError};
use super::extract::ApiJson;
use crate::middleware::{AdminUser, AuthUser};
use crate::models::{LoginRequest, RegisterRequest, UserProfile};
use crate::services::TokenResponse;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    let token = state.services.auth_service.register(request).await?;
    Ok((StatusCode::CREATED, Json(token)))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    Ok(Json(state.services.auth_service.login(request).await?))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}

fn ensure_bootstrap_enabled(state: &AppState) -> ApiResult<()> {
    if state.settings.features.bootstrap_endpoints {
        Ok(())
    } else {
        Err(HttpError::new(StatusCode::NOT_FOUND, "Not found"))
    }
}

/// Create (or promote) the configured administrator account
pub async fn create_admin(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    ensure_bootstrap_enabled(&state)?;
    let (admin, created) = state.services.auth_service.ensure_admin_account().await?;

    let message = if created {
        "Admin user created successfully"
    } else {
        "Admin user already exists"
    };
    Ok(Json(json!({ "message": message, "email": admin.email })))
}

/// Insert the sample programme when no events exist yet
pub async fn seed_data(State(state): State<AppState>, AdminUser(admin): AdminUser) -> ApiResult<Json<Value>> {
    ensure_bootstrap_enabled(&state)?;
    let created = state.services.event_service.seed_sample_events(admin.id).await?;

    let message = if created > 0 {
        "Sample data created successfully"
    } else {
        "Sample data already exists"
    };
    Ok(Json(json!({ "message": message, "events_created": created })))
}
