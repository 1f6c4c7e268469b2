//! Database module
//!
//! This module handles database connections and the repository layer

pub mod connection;
pub mod memory;
pub mod repositories;
pub mod service;

// Re-export commonly used database components
pub use connection::{create_pool, health_check, run_migrations, DatabasePool};
pub use memory::MemoryStore;
pub use repositories::{AnalyticsRepository, EventRepository, ReservationRepository, UserRepository};
pub use service::DatabaseService;
