//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the cultural center service.

use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::LoggingConfig;
use crate::utils::errors::{CulturalCenterError, Result};

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file appender on drop and must be kept alive
/// for the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.level).map_err(|e| {
        CulturalCenterError::Config(format!("Invalid log filter '{}': {}", config.level, e))
    })?;

    let (file_layer, guard) = match config.directory.as_deref().filter(|dir| !dir.is_empty()) {
        Some(directory) => {
            let file_appender = tracing_appender::rolling::daily(directory, "cultural-center.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().with_ansi(false).with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    let init_result = if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stdout))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stdout))
            .try_init()
    };
    init_result.map_err(|e| CulturalCenterError::Config(format!("Failed to initialize logging: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log user actions with structured data
pub fn log_user_action(user_id: Uuid, action: &str, details: Option<&str>) {
    info!(
        user_id = %user_id,
        action = action,
        details = details,
        "User action performed"
    );
}

/// Log event management actions
pub fn log_event_action(event_id: Uuid, action: &str, admin_id: Uuid, details: Option<&str>) {
    info!(
        event_id = %event_id,
        action = action,
        admin_id = %admin_id,
        details = details,
        "Event action performed"
    );
}

/// Log reservation lifecycle changes
pub fn log_reservation_action(reservation_id: Uuid, action: &str, actor_id: Uuid, event_id: Uuid) {
    info!(
        reservation_id = %reservation_id,
        action = action,
        actor_id = %actor_id,
        event_id = %event_id,
        "Reservation action performed"
    );
}

/// Log check-in attempts
pub fn log_checkin(identifier_kind: &str, reservation_id: Option<Uuid>, success: bool, reason: Option<&str>) {
    if success {
        info!(
            method = identifier_kind,
            reservation_id = ?reservation_id,
            "Check-in completed"
        );
    } else {
        warn!(
            method = identifier_kind,
            reservation_id = ?reservation_id,
            reason = reason,
            "Check-in rejected"
        );
    }
}

/// Log admin actions
pub fn log_admin_action(admin_id: Uuid, action: &str, target: Option<&str>, details: Option<&str>) {
    warn!(
        admin_id = %admin_id,
        action = action,
        target = target,
        details = details,
        "Admin action performed"
    );
}

/// Log API errors with context
pub fn log_api_error(api: &str, error: &str, context: Option<&str>) {
    error!(
        api = api,
        error = error,
        context = context,
        "API error occurred"
    );
}

/// Log performance metrics
pub fn log_performance_metric(metric_name: &str, value: f64, unit: &str) {
    debug!(
        metric = metric_name,
        value = value,
        unit = unit,
        "Performance metric recorded"
    );
}
