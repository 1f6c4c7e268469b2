//! Services module
//!
//! This module contains business logic services

pub mod analytics;
pub mod auth;
pub mod cache;
pub mod checkin;
pub mod dashboard;
pub mod event;
pub mod live;
pub mod notification;
pub mod report;
pub mod reservation;
pub mod user;

// Re-export commonly used services
pub use analytics::AnalyticsService;
pub use auth::{AuthService, Claims, TokenResponse};
pub use cache::{CacheService, CacheStats};
pub use checkin::{CheckinService, Identifier};
pub use dashboard::DashboardService;
pub use event::EventService;
pub use live::{LiveMetricsHub, LiveUpdate, RequestMetrics};
pub use notification::{Delivery, MessageTemplate, NotificationService, NotificationStats};
pub use report::ReportService;
pub use reservation::{ReservationExport, ReservationService};
pub use user::UserService;

use std::sync::Arc;

use crate::config::Settings;
use crate::database::DatabaseService;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Debug, Clone)]
pub struct ServiceFactory {
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub event_service: EventService,
    pub reservation_service: ReservationService,
    pub checkin_service: CheckinService,
    pub report_service: ReportService,
    pub dashboard_service: DashboardService,
    pub analytics_service: AnalyticsService,
    pub notification_service: NotificationService,
    pub cache_service: CacheService,
    pub hub: Arc<LiveMetricsHub>,
    db: DatabaseService,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    pub fn new(settings: &Settings, db: DatabaseService, cache: CacheService) -> Result<Self> {
        let hub = Arc::new(LiveMetricsHub::default());
        let notification_service =
            NotificationService::new(settings.email.clone(), settings.features.email_notifications)?;
        let auth_service = AuthService::new(
            db.clone(),
            settings.auth.clone(),
            cache.clone(),
            notification_service.clone(),
        )?;

        Ok(Self {
            user_service: UserService::new(
                db.clone(),
                auth_service.clone(),
                cache.clone(),
                settings.limits.clone(),
            ),
            event_service: EventService::new(db.clone(), cache.clone()),
            reservation_service: ReservationService::new(
                db.clone(),
                settings.limits.clone(),
                cache.clone(),
                notification_service.clone(),
                hub.clone(),
            ),
            checkin_service: CheckinService::new(
                db.clone(),
                cache.clone(),
                notification_service.clone(),
                hub.clone(),
            ),
            report_service: ReportService::new(db.clone()),
            dashboard_service: DashboardService::new(db.clone(), cache.clone(), settings.clone()),
            analytics_service: AnalyticsService::new(db.clone(), cache.clone(), settings.analytics.clone()),
            auth_service,
            notification_service,
            cache_service: cache,
            hub,
            db,
        })
    }

    /// Health check for all services
    pub async fn health_check(&self) -> ServiceHealthStatus {
        ServiceHealthStatus {
            database_healthy: self.db.health_check().await.is_ok(),
            cache_healthy: self.cache_service.health_check().await,
            email_enabled: self.notification_service.is_enabled(),
            cache_backend: self.cache_service.backend_name(),
            storage_backend: self.db.backend(),
        }
    }
}

/// Health status for all services
#[derive(Debug, Clone)]
pub struct ServiceHealthStatus {
    pub database_healthy: bool,
    pub cache_healthy: bool,
    pub email_enabled: bool,
    pub cache_backend: &'static str,
    pub storage_backend: &'static str,
}

impl ServiceHealthStatus {
    /// Check if all critical services are healthy
    pub fn is_healthy(&self) -> bool {
        self.database_healthy && self.cache_healthy
    }

    /// Get list of unhealthy services
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.database_healthy {
            issues.push(format!("Database ({}) unreachable", self.storage_backend));
        }
        if !self.cache_healthy {
            issues.push(format!("Cache ({}) unreachable", self.cache_backend));
        }
        if !self.email_enabled {
            issues.push("Email delivery disabled".to_string());
        }

        issues
    }
}
