//! Dashboard handlers (admin only)

use axum::extract::State;
use axum::Json;

use super::error::ApiResult;
use super::extract::ApiQuery;
use crate::middleware::AdminUser;
use crate::models::{
    ActivityFeedQuery, ActivityItem, CategoryDistribution, DashboardStats, MonthlyAttendancePoint, OccupancyRate,
    QuickStats, SystemStatus, WeeklyTrendPoint,
};
use crate::state::AppState;

pub async fn stats(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(state.services.dashboard_service.stats().await?))
}

pub async fn quick_stats(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<QuickStats>> {
    Ok(Json(state.services.dashboard_service.quick_stats().await?))
}

pub async fn system_status(State(state): State<AppState>, _admin: AdminUser) -> Json<SystemStatus> {
    Json(state.services.dashboard_service.system_status().await)
}

pub async fn activity_feed(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<ActivityFeedQuery>,
) -> ApiResult<Json<Vec<ActivityItem>>> {
    Ok(Json(state.services.dashboard_service.activity_feed(query.limit).await?))
}

pub async fn monthly_attendance(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<MonthlyAttendancePoint>>> {
    Ok(Json(state.services.dashboard_service.monthly_attendance().await?))
}

pub async fn categories_distribution(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<CategoryDistribution>>> {
    Ok(Json(state.services.dashboard_service.category_distribution().await?))
}

pub async fn weekly_trends(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<WeeklyTrendPoint>>> {
    Ok(Json(state.services.dashboard_service.weekly_trends().await?))
}

pub async fn occupancy_rates(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<OccupancyRate>>> {
    Ok(Json(state.services.dashboard_service.occupancy_rates().await?))
}
