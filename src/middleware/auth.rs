//! Authentication extractors
//!
//! Bearer-token identities for handlers: `AuthUser` for any signed-in account,
//! `AdminUser` for administrators and `MaybeAuthUser` where a token is optional.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::{debug, warn};

use crate::handlers::error::HttpError;
use crate::models::User;
use crate::state::AppState;
use crate::utils::errors::CulturalCenterError;

/// Raw token of an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Any active account
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// An active administrator
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

/// Account when a valid token was supplied, `None` otherwise
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            debug!(uri = %parts.uri, "Missing bearer token");
            CulturalCenterError::PermissionDenied("Not authenticated".to_string())
        })?;

        let user = state.services.auth_service.authenticate(token).await.map_err(|e| {
            warn!(uri = %parts.uri, error = %e, "Token rejected");
            e
        })?;
        Ok(AuthUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            warn!(user_id = %user.id, uri = %parts.uri, "Unauthorized admin access attempt");
            return Err(CulturalCenterError::PermissionDenied("Admin access required".to_string()).into());
        }
        Ok(AdminUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(MaybeAuthUser(None));
        };
        Ok(MaybeAuthUser(state.services.auth_service.authenticate(token).await.ok()))
    }
}
