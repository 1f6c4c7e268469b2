//! Realtime dashboard socket
//!
//! Browsers cannot attach an `Authorization` header to a websocket handshake,
//! so the admin token travels in the `token` query parameter.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::error::{ApiResult, HttpError};
use super::extract::ApiQuery;
use crate::models::{DashboardMessage, User};
use crate::state::AppState;
use crate::utils::errors::CulturalCenterError;

#[derive(Debug, Deserialize)]
pub struct SocketQuery {
    pub token: Option<String>,
}

/// The token is checked before the upgrade so that rejected clients get a
/// plain HTTP error instead of a socket that closes immediately.
pub async fn dashboard_socket(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SocketQuery>,
    upgrade: Option<WebSocketUpgrade>,
) -> ApiResult<Response> {
    let user = authorize(&state, query.token.as_deref()).await?;
    let upgrade = upgrade.ok_or_else(|| HttpError::new(StatusCode::UPGRADE_REQUIRED, "Expected a websocket upgrade"))?;

    Ok(upgrade.on_upgrade(move |socket| run_session(socket, state, user)))
}

async fn authorize(state: &AppState, token: Option<&str>) -> ApiResult<User> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| HttpError::new(StatusCode::UNAUTHORIZED, "Missing token"))?;

    let user = state.services.auth_service.authenticate(token).await?;
    if !user.is_admin {
        warn!(user_id = %user.id, "Non-admin dashboard socket attempt");
        return Err(CulturalCenterError::PermissionDenied("Admin access required".to_string()).into());
    }
    Ok(user)
}

async fn metrics_message(state: &AppState, initial: bool) -> Option<String> {
    let metrics = match state
        .services
        .analytics_service
        .live_metrics(&state.request_metrics)
        .await
    {
        Ok(metrics) => metrics,
        Err(e) => {
            warn!(error = %e, "Failed to compute live metrics");
            return None;
        }
    };

    let message = if initial {
        DashboardMessage::initial(metrics)
    } else {
        DashboardMessage::update(metrics)
    };
    serde_json::to_string(&message).ok()
}

async fn run_session(socket: WebSocket, state: AppState, user: User) {
    info!(user_id = %user.id, "Dashboard socket connected");
    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.services.hub.subscribe();

    let period = Duration::from_secs(state.settings.analytics.metrics_interval_seconds.max(1));
    let mut ticker = tokio::time::interval(period);
    // first tick completes immediately
    ticker.tick().await;

    if let Some(text) = metrics_message(&state, true).await {
        if sender.send(Message::Text(text)).await.is_err() {
            return;
        }
    }

    loop {
        let outgoing = tokio::select! {
            _ = ticker.tick() => metrics_message(&state, false).await.map(Message::Text),
            update = updates.recv() => match update {
                Ok(kind) => {
                    debug!(?kind, "Live update received");
                    metrics_message(&state, false).await.map(Message::Text)
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Dashboard socket lagged behind live updates");
                    metrics_message(&state, false).await.map(Message::Text)
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) if text.trim() == "ping" => Some(Message::Text("pong".to_string())),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(error = %e, "Dashboard socket receive error");
                    break;
                }
                Some(Ok(_)) => None,
            },
        };

        if let Some(message) = outgoing {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    }

    info!(user_id = %user.id, "Dashboard socket closed");
}
