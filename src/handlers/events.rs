//! Event handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use super::error::ApiResult;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{AdminUser, MaybeAuthUser};
use crate::models::{
    CategoryListResponse, CreateEventRequest, DaySchedule, EventListQuery, EventReservationRow, EventStatsOverview,
    EventView, MessageResponse, PageParams, Paginated, ScheduleQuery, SlotCheck, SlotCheckQuery,
    UpdateEventRequest,
};
use crate::services::EventService;
use crate::state::AppState;

fn is_admin(user: &MaybeAuthUser) -> bool {
    user.0.as_ref().is_some_and(|u| u.is_admin)
}

pub async fn list_events(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    ApiQuery(query): ApiQuery<EventListQuery>,
) -> ApiResult<Json<Vec<EventView>>> {
    let events = state.services.event_service.list_events(query, is_admin(&user)).await?;
    Ok(Json(events))
}

pub async fn get_event(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    ApiPath(event_id): ApiPath<Uuid>,
) -> ApiResult<Json<EventView>> {
    Ok(Json(state.services.event_service.get_event(event_id, is_admin(&user)).await?))
}

pub async fn create_event(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(request): ApiJson<CreateEventRequest>,
) -> ApiResult<(StatusCode, Json<EventView>)> {
    let event = state.services.event_service.create_event(request, admin.id).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update_event(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(event_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateEventRequest>,
) -> ApiResult<Json<EventView>> {
    Ok(Json(
        state.services.event_service.update_event(event_id, request, admin.id).await?,
    ))
}

pub async fn delete_event(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(event_id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    state.services.event_service.delete_event(event_id, admin.id).await?;
    Ok(Json(MessageResponse::new("Event deleted successfully")))
}

pub async fn toggle_publish(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(event_id): ApiPath<Uuid>,
) -> ApiResult<Json<EventView>> {
    Ok(Json(state.services.event_service.toggle_publish(event_id, admin.id).await?))
}

pub async fn categories() -> Json<Vec<&'static str>> {
    Json(EventService::category_labels())
}

pub async fn category_options() -> Json<CategoryListResponse> {
    Json(EventService::category_options())
}

pub async fn stats_overview(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<EventStatsOverview>> {
    Ok(Json(state.services.event_service.stats_overview().await?))
}

pub async fn event_reservations(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(event_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<Paginated<EventReservationRow>>> {
    Ok(Json(
        state.services.event_service.event_reservations(event_id, params).await?,
    ))
}

pub async fn schedule(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ScheduleQuery>,
) -> ApiResult<Json<DaySchedule>> {
    Ok(Json(state.services.event_service.schedule(query.date).await?))
}

pub async fn check_slot(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SlotCheckQuery>,
) -> ApiResult<Json<SlotCheck>> {
    Ok(Json(
        state.services.event_service.check_slot(query.date, &query.time).await?,
    ))
}
