//! Request logging middleware
//!
//! Times every request, logs it and feeds the per-route counters shown on the
//! live dashboard.

use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use crate::state::AppState;
use crate::utils::logging::log_performance_metric;

/// Requests slower than this are logged as warnings
const SLOW_REQUEST_MS: f64 = 1000.0;

/// Metric key for a route template: `/api/events/:id` becomes `api_events_id`
pub fn route_key(path: &str) -> String {
    let key = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.trim_start_matches(':').trim_start_matches('{').trim_end_matches('}'))
        .map(|segment| segment.replace(['-', '.'], "_"))
        .collect::<Vec<_>>()
        .join("_");
    if key.is_empty() {
        "root".to_string()
    } else {
        key
    }
}

pub async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    let status = response.status();
    state
        .request_metrics
        .record(&route_key(&route), elapsed_ms, !status.is_client_error() && !status.is_server_error());

    if elapsed_ms > SLOW_REQUEST_MS {
        warn!(method = %method, route = %route, status = status.as_u16(), elapsed_ms = elapsed_ms, "Slow request");
        log_performance_metric("slow_request_ms", elapsed_ms, "ms");
    } else {
        debug!(method = %method, route = %route, status = status.as_u16(), elapsed_ms = elapsed_ms, "Request handled");
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_key() {
        assert_eq!(route_key("/api/events"), "api_events");
        assert_eq!(route_key("/api/events/:id"), "api_events_id");
        assert_eq!(route_key("/api/admin/users/bulk-import"), "api_admin_users_bulk_import");
        assert_eq!(route_key("/"), "root");
    }
}
