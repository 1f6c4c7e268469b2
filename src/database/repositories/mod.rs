//! Database repositories module
//!
//! Each repository is a trait with a Postgres implementation; the in-memory
//! implementations live in `database::memory`.

pub mod analytics;
pub mod event;
pub mod reservation;
pub mod user;

// Re-export repositories
pub use analytics::{AnalyticsRepository, PgAnalyticsRepository};
pub use event::{EventRepository, PgEventRepository};
pub use reservation::{PgReservationRepository, ReservationRepository};
pub use user::{PgUserRepository, UserRepository};

/// Name of the violated unique constraint, if the error is a unique violation
pub(crate) fn unique_violation_constraint(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            Some(db.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    unique_violation_constraint(err).is_some()
}
