//! Admin handlers: user management, reservation management and reports

use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use super::error::{ApiResult, HttpError};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AdminUser;
use crate::models::{
    AdminCreateUserRequest, AdminReservationList, AdminReservationQuery, AdminStats, AttendanceSummaryQuery,
    AttendanceSummaryReport, BulkActionResult, BulkImportResult, BulkReservationActionRequest,
    BulkUserActionRequest, CheckInResponse, EventAttendanceReport, ExportQuery, MessageResponse, MonthlyReport,
    MonthlyReportQuery, Reservation, ReservationMetrics, UpdateUserRequest, UserDetail, UserListResponse,
    UserMetrics, UserProfile, UserQuery,
};
use crate::services::ReservationExport;
use crate::state::AppState;
use crate::utils::helpers::sanitize_filename;

/// `text/csv` attachment response
fn csv_attachment(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", sanitize_filename(filename)),
            ),
        ],
        body,
    )
        .into_response()
}

pub async fn admin_stats(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<AdminStats>> {
    Ok(Json(state.services.dashboard_service.admin_stats().await?))
}

// Users

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<UserListResponse>> {
    Ok(Json(state.services.user_service.list(query).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ApiResult<Json<UserDetail>> {
    Ok(Json(state.services.user_service.detail(user_id).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(request): ApiJson<AdminCreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let profile = state.services.user_service.create(request, admin.id).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(state.services.user_service.update(user_id, request, admin.id).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    state.services.user_service.delete(user_id, admin.id).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

pub async fn bulk_user_action(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(request): ApiJson<BulkUserActionRequest>,
) -> ApiResult<Json<BulkActionResult>> {
    Ok(Json(state.services.user_service.bulk_action(request, admin.id).await?))
}

/// Multipart upload with a `file` part and an optional `default_password` part
pub async fn bulk_import_users(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    mut multipart: Multipart,
) -> ApiResult<Json<BulkImportResult>> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut default_password = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HttpError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| HttpError::bad_request(format!("Could not read upload: {}", e)))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("default_password") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| HttpError::bad_request(format!("Invalid default_password: {}", e)))?;
                default_password = Some(text);
            }
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| HttpError::bad_request("A CSV file is required"))?;
    let result = state
        .services
        .user_service
        .bulk_import(&filename, &bytes, default_password, admin.id)
        .await?;
    Ok(Json(result))
}

pub async fn users_metrics(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<UserMetrics>> {
    Ok(Json(state.services.user_service.metrics().await?))
}

// Reservations

pub async fn list_reservations(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<AdminReservationQuery>,
) -> ApiResult<Json<AdminReservationList>> {
    Ok(Json(state.services.reservation_service.admin_list(query).await?))
}

pub async fn reservation_metrics(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<ReservationMetrics>> {
    Ok(Json(state.services.reservation_service.metrics().await?))
}

pub async fn admin_check_in(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(reservation_id): ApiPath<Uuid>,
) -> ApiResult<Json<CheckInResponse>> {
    Ok(Json(
        state.services.checkin_service.check_in_by_id(reservation_id, admin.id).await?,
    ))
}

pub async fn admin_cancel_reservation(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(reservation_id): ApiPath<Uuid>,
) -> ApiResult<Json<Reservation>> {
    Ok(Json(
        state.services.reservation_service.admin_cancel(reservation_id, admin.id).await?,
    ))
}

pub async fn bulk_reservation_action(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(request): ApiJson<BulkReservationActionRequest>,
) -> ApiResult<Json<BulkActionResult>> {
    Ok(Json(
        state.services.reservation_service.bulk_action(request, admin.id).await?,
    ))
}

pub async fn export_reservations(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> ApiResult<Response> {
    let response = match state.services.reservation_service.export(query.format).await? {
        ReservationExport::Csv { filename, body } => csv_attachment(&filename, body),
        ReservationExport::Json(rows) => Json(rows).into_response(),
    };
    Ok(response)
}

// Reports

pub async fn attendance_report(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(event_id): ApiPath<Uuid>,
) -> ApiResult<Json<EventAttendanceReport>> {
    Ok(Json(state.services.report_service.event_attendance(event_id).await?))
}

pub async fn attendance_report_csv(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(event_id): ApiPath<Uuid>,
) -> ApiResult<Response> {
    let (filename, body) = state.services.report_service.event_attendance_csv(event_id).await?;
    Ok(csv_attachment(&filename, body))
}

pub async fn attendance_summary(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<AttendanceSummaryQuery>,
) -> ApiResult<Json<AttendanceSummaryReport>> {
    Ok(Json(state.services.report_service.attendance_summary(query).await?))
}

pub async fn monthly_report(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<MonthlyReportQuery>,
) -> ApiResult<Json<MonthlyReport>> {
    Ok(Json(state.services.report_service.monthly(query).await?))
}
