//! Data models
//!
//! Stored rows (`FromRow`), request payloads and response views.

pub mod analytics;
pub mod common;
pub mod dashboard;
pub mod event;
pub mod report;
pub mod reservation;
pub mod user;

pub use analytics::*;
pub use common::*;
pub use dashboard::*;
pub use event::*;
pub use report::*;
pub use reservation::*;
pub use user::*;
