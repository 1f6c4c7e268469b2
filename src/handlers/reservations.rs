//! Reservation and check-in handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use super::error::ApiResult;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{AdminUser, AuthUser};
use crate::models::{
    CheckInRequest, CheckInResponse, CreateReservationRequest, MyReservationsQuery, Reservation, ReservationCreated,
    ReservationWithEvent,
};
use crate::state::AppState;

pub async fn create_reservation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(request): ApiJson<CreateReservationRequest>,
) -> ApiResult<(StatusCode, Json<ReservationCreated>)> {
    let created = state.services.reservation_service.create(&user, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn my_reservations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<MyReservationsQuery>,
) -> ApiResult<Json<Vec<ReservationWithEvent>>> {
    Ok(Json(state.services.reservation_service.list_mine(&user, query).await?))
}

pub async fn get_reservation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(reservation_id): ApiPath<Uuid>,
) -> ApiResult<Json<ReservationWithEvent>> {
    Ok(Json(state.services.reservation_service.get(reservation_id, &user).await?))
}

pub async fn cancel_reservation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(reservation_id): ApiPath<Uuid>,
) -> ApiResult<Json<Reservation>> {
    Ok(Json(
        state.services.reservation_service.cancel(reservation_id, &user).await?,
    ))
}

/// Door check-in by QR payload, code, email or phone
pub async fn check_in(
    State(state): State<AppState>,
    AdminUser(staff): AdminUser,
    ApiJson(request): ApiJson<CheckInRequest>,
) -> ApiResult<Json<CheckInResponse>> {
    Ok(Json(state.services.checkin_service.check_in(request, staff.id).await?))
}

pub async fn check_in_by_id(
    State(state): State<AppState>,
    AdminUser(staff): AdminUser,
    ApiPath(reservation_id): ApiPath<Uuid>,
) -> ApiResult<Json<CheckInResponse>> {
    Ok(Json(
        state.services.checkin_service.check_in_by_id(reservation_id, staff.id).await?,
    ))
}
