//! Analytics handlers: client event tracking and customer segmentation

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use super::error::{ApiResult, HttpError};
use super::extract::ApiQuery;
use crate::middleware::{AdminUser, MaybeAuthUser};
use crate::models::{SegmentationResult, TrackEventQuery, TrackEventResponse};
use crate::state::AppState;

/// Parse the optional metadata body; an empty body is an empty object
fn parse_metadata(body: &[u8]) -> ApiResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body).map_err(|e| {
        HttpError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Invalid metadata JSON: {}", e),
        )
    })
}

pub async fn track_event(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    ApiQuery(query): ApiQuery<TrackEventQuery>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<TrackEventResponse>)> {
    let analytics = &state.services.analytics_service;
    if !analytics.is_enabled() {
        let response = analytics.track(&query.event_type, None, Value::Null).await?;
        return Ok((StatusCode::ACCEPTED, Json(response)));
    }

    let metadata = parse_metadata(&body)?;
    let response = analytics
        .track(&query.event_type, user.map(|u| u.id), metadata)
        .await?;
    Ok((StatusCode::OK, Json(response)))
}

pub async fn train_segmentation(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<SegmentationResult>> {
    Ok(Json(state.services.analytics_service.train_segmentation().await?))
}

pub async fn segments(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<SegmentationResult>> {
    Ok(Json(state.services.analytics_service.segments().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_an_empty_object() {
        assert_eq!(parse_metadata(b"").unwrap(), serde_json::json!({}));
        assert_eq!(parse_metadata(b"  \n").unwrap(), serde_json::json!({}));
    }

    #[test]
    fn malformed_body_is_rejected() {
        let err = parse_metadata(b"{not json").unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn object_body_is_kept() {
        let value = parse_metadata(br#"{"page":"/events"}"#).unwrap();
        assert_eq!(value["page"], "/events");
    }
}
