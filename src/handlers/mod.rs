//! HTTP handlers module
//!
//! This module contains every route of the API organized by area:
//! - Account, event and reservation handlers for visitors
//! - Admin, report and dashboard handlers for staff
//! - The realtime dashboard socket

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod extract;
pub mod reservations;
pub mod system;
pub mod ws;

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, post, put};
use axum::{middleware as axum_middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Environment;
use crate::middleware::logging::track_requests;
use crate::middleware::rate_limit::limit_by_ip;
use crate::state::AppState;

pub use error::{ApiResult, HttpError};

fn cors_layer(state: &AppState) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if state.settings.app.environment == Environment::Development {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = state
        .settings
        .server
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(origins)
}

/// Routes guarded by the per-IP rate limiter
fn limited_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/checkin", post(reservations::check_in))
        .route("/api/checkin/:reservation_id", post(reservations::check_in_by_id))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), limit_by_ip))
}

fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/api/events", get(events::list_events).post(events::create_event))
        .route(
            "/api/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/api/events/:id/publish", post(events::toggle_publish))
        .route("/api/events/:id/reservations", get(events::event_reservations))
        .route("/api/events/categories/list", get(events::category_options))
        .route("/api/events/stats/overview", get(events::stats_overview))
        .route("/api/events/schedule", get(events::schedule))
        .route("/api/events/schedule/check", get(events::check_slot))
        .route("/api/categories", get(events::categories))
}

fn reservation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/reservations",
            get(reservations::my_reservations).post(reservations::create_reservation),
        )
        .route(
            "/api/reservations/:id",
            get(reservations::get_reservation).delete(reservations::cancel_reservation),
        )
        .route("/api/reservations/:id/cancel", put(reservations::cancel_reservation))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/stats", get(admin::admin_stats))
        .route("/api/admin/users", get(admin::list_users).post(admin::create_user))
        .route("/api/admin/users/bulk-action", post(admin::bulk_user_action))
        .route("/api/admin/users/bulk-import", post(admin::bulk_import_users))
        .route(
            "/api/admin/users/:id",
            get(admin::get_user).put(admin::update_user).delete(admin::delete_user),
        )
        .route("/api/admin/users-metrics", get(admin::users_metrics))
        .route("/api/admin/reservations", get(admin::list_reservations))
        .route("/api/admin/reservations/metrics", get(admin::reservation_metrics))
        .route("/api/admin/reservations/export", get(admin::export_reservations))
        .route("/api/admin/reservations/bulk-action", post(admin::bulk_reservation_action))
        .route("/api/admin/reservations/:id/checkin", post(admin::admin_check_in))
        .route("/api/admin/reservations/:id", delete(admin::admin_cancel_reservation))
        .route("/api/admin/events/:id/attendance-report", get(admin::attendance_report))
        .route(
            "/api/admin/events/:id/attendance-report/csv",
            get(admin::attendance_report_csv),
        )
        .route("/api/admin/reports/attendance-summary", get(admin::attendance_summary))
        .route("/api/admin/reports/monthly", get(admin::monthly_report))
}

fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard/stats", get(dashboard::stats))
        .route("/api/dashboard/quick-stats", get(dashboard::quick_stats))
        .route("/api/dashboard/system-status", get(dashboard::system_status))
        .route("/api/dashboard/activity-feed", get(dashboard::activity_feed))
        .route(
            "/api/dashboard/charts/monthly-attendance",
            get(dashboard::monthly_attendance),
        )
        .route(
            "/api/dashboard/charts/categories-distribution",
            get(dashboard::categories_distribution),
        )
        .route("/api/dashboard/charts/weekly-trends", get(dashboard::weekly_trends))
        .route("/api/dashboard/charts/occupancy-rates", get(dashboard::occupancy_rates))
        .route("/api/analytics/track-event", post(analytics::track_event))
        .route("/api/analytics/train-segmentation", post(analytics::train_segmentation))
        .route("/api/analytics/segments", get(analytics::segments))
        .route("/ws/dashboard", get(ws::dashboard_socket))
}

/// Build the application router with all routes and layers
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.settings.limits.max_upload_size_mb * 1024 * 1024;
    let timeout = Duration::from_secs(state.settings.server.request_timeout_seconds.max(1));

    Router::new()
        .route("/api/health", get(system::health))
        .route("/api/me", get(auth::me))
        .route("/api/create-admin", post(auth::create_admin))
        .route("/api/seed-data", post(auth::seed_data))
        .merge(limited_routes(&state))
        .merge(event_routes())
        .merge(reservation_routes())
        .merge(admin_routes())
        .merge(dashboard_routes())
        .layer(axum_middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors_layer(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
