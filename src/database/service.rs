//! Database service layer
//!
//! Bundles the repositories behind trait objects so services never know
//! which backend is in use.

use std::sync::Arc;

use crate::config::{DatabaseConfig, StorageBackend};
use crate::database::memory::MemoryStore;
use crate::database::repositories::{
    AnalyticsRepository, EventRepository, PgAnalyticsRepository, PgEventRepository, PgReservationRepository,
    PgUserRepository, ReservationRepository, UserRepository,
};
use crate::database::{connection, DatabasePool};
use crate::utils::errors::Result;

#[derive(Clone)]
pub struct DatabaseService {
    pub users: Arc<dyn UserRepository>,
    pub events: Arc<dyn EventRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub analytics: Arc<dyn AnalyticsRepository>,
    pool: Option<DatabasePool>,
}

impl DatabaseService {
    /// Postgres-backed repositories sharing one pool
    pub fn postgres(pool: DatabasePool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            events: Arc::new(PgEventRepository::new(pool.clone())),
            reservations: Arc::new(PgReservationRepository::new(pool.clone())),
            analytics: Arc::new(PgAnalyticsRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Process-local repositories sharing one store
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            events: store.clone(),
            reservations: store.clone(),
            analytics: store,
            pool: None,
        }
    }

    /// Build the configured backend, connecting and migrating when it is Postgres
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        match config.backend {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Ok(Self::in_memory())
            }
            StorageBackend::Postgres => {
                let pool = connection::create_pool(config).await?;
                if config.run_migrations {
                    connection::run_migrations(&pool).await?;
                }
                Ok(Self::postgres(pool))
            }
        }
    }

    pub fn backend(&self) -> &'static str {
        if self.pool.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }

    pub fn pool(&self) -> Option<&DatabasePool> {
        self.pool.as_ref()
    }

    pub async fn health_check(&self) -> Result<()> {
        match &self.pool {
            Some(pool) => connection::health_check(pool).await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for DatabaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseService").field("backend", &self.backend()).finish()
    }
}
