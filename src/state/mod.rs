//! Shared application state
//!
//! Everything a request handler needs: settings, the service factory, request
//! statistics and the login/check-in rate limiter.

use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::database::DatabaseService;
use crate::middleware::rate_limit::RateLimitMiddleware;
use crate::services::{CacheService, RequestMetrics, ServiceFactory};
use crate::utils::errors::Result;

#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub services: ServiceFactory,
    pub request_metrics: Arc<RequestMetrics>,
    pub rate_limiter: RateLimitMiddleware,
}

impl AppState {
    /// Assemble state from already connected storage and cache
    pub fn new(settings: Settings, db: DatabaseService, cache: CacheService) -> Result<Self> {
        let services = ServiceFactory::new(&settings, db, cache)?;
        let rate_limiter = RateLimitMiddleware::new(&settings.rate_limit)?;

        Ok(Self {
            settings: Arc::new(settings),
            services,
            request_metrics: Arc::new(RequestMetrics::default()),
            rate_limiter,
        })
    }

    /// Connect storage and cache as configured, then assemble state
    pub async fn connect(settings: Settings) -> Result<Self> {
        let db = DatabaseService::from_config(&settings.database).await?;
        let cache = CacheService::connect(&settings.redis).await?;
        info!(
            storage = db.backend(),
            cache = cache.backend_name(),
            "Application state initialized"
        );
        Self::new(settings, db, cache)
    }

    /// State over the in-memory store and local cache
    pub fn in_memory(settings: Settings) -> Result<Self> {
        let cache = CacheService::local(&settings.redis);
        Self::new(settings, DatabaseService::in_memory(), cache)
    }
}
