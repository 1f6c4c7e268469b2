//! Reservation and check-in models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::common::SortOrder;
use super::event::EventBrief;
use super::user::UserBrief;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reservation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    CheckedIn,
    Cancelled,
}

impl ReservationStatus {
    /// Active reservations hold a seat
    pub fn is_active(&self) -> bool {
        !matches!(self, ReservationStatus::Cancelled)
    }

    /// Reservations that can still be checked in
    pub fn is_checkin_eligible(&self) -> bool {
        matches!(self, ReservationStatus::Confirmed | ReservationStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::CheckedIn => "checked_in",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub status: ReservationStatus,
    pub checkin_code: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn qr_payload(&self) -> String {
        format!("reservation:{}", self.id)
    }
}

/// How a check-in was resolved at the door
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "checkin_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckinMethod {
    Code,
    Email,
    Phone,
    ReservationId,
    Manual,
}

impl CheckinMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckinMethod::Code => "code",
            CheckinMethod::Email => "email",
            CheckinMethod::Phone => "phone",
            CheckinMethod::ReservationId => "reservation_id",
            CheckinMethod::Manual => "manual",
        }
    }
}

/// Check-in log entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Checkin {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub method: CheckinMethod,
    pub checked_in_by: Option<Uuid>,
    pub checked_in_at: DateTime<Utc>,
}

/// Row to insert
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub checkin_code: String,
    pub notes: Option<String>,
}

/// Result of an atomic reservation attempt
#[derive(Debug, Clone)]
pub enum ReservationOutcome {
    Created(Reservation),
    EventNotFound,
    AlreadyReserved,
    EventFull,
    UserLimitReached,
    CodeCollision,
}

/// Result of a guarded status change
#[derive(Debug, Clone)]
pub enum StatusTransition {
    Applied(Reservation),
    NotFound,
    Rejected(ReservationStatus),
}

/// Metadata recorded with a check-in
#[derive(Debug, Clone, Copy)]
pub struct CheckinContext {
    pub method: CheckinMethod,
    pub staff_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReservationRequest {
    pub event_id: Uuid,
    /// Accepted for client compatibility; the caller's token decides the owner
    pub user_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationCreated {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub event_title: String,
    pub qr_payload: String,
}

/// Reservation with its event, as listed for the owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationWithEvent {
    pub reservation: Reservation,
    pub event: Option<EventBrief>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MyReservationsQuery {
    pub status_filter: Option<ReservationStatus>,
}

/// Reservation row of the per-event admin listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventReservationRow {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: Option<String>,
}

/// Reservation row of the global admin listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminReservationView {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub user: Option<UserBrief>,
    pub event: Option<EventBrief>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationSortField {
    #[default]
    CreatedAt,
    EventDate,
    UserName,
    Status,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminReservationQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub status_filter: Option<ReservationStatus>,
    pub event_filter: Option<String>,
    pub user_search: Option<String>,
    #[serde(default)]
    pub sort_by: ReservationSortField,
    #[serde(default)]
    pub sort_order: SortOrder,
}

fn default_limit() -> i64 {
    super::common::DEFAULT_PAGE_SIZE
}

impl Default for AdminReservationQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
            status_filter: None,
            event_filter: None,
            user_search: None,
            sort_by: ReservationSortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminReservationList {
    pub reservations: Vec<AdminReservationView>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationMetrics {
    pub total_reservations: i64,
    pub confirmed_reservations: i64,
    pub checked_in_reservations: i64,
    pub cancelled_reservations: i64,
    pub pending_reservations: i64,
    pub today_reservations: i64,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationBulkAction {
    Checkin,
    Cancel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkReservationActionRequest {
    pub reservation_ids: Vec<Uuid>,
    pub action: ReservationBulkAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Excel,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInRequest {
    pub identifier: String,
    pub event_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInResponse {
    pub message: String,
    pub reservation_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub event_title: String,
    pub checked_in_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(ReservationStatus::Confirmed.is_active());
        assert!(ReservationStatus::CheckedIn.is_active());
        assert!(!ReservationStatus::Cancelled.is_active());
        assert!(ReservationStatus::Pending.is_checkin_eligible());
        assert!(!ReservationStatus::CheckedIn.is_checkin_eligible());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&ReservationStatus::CheckedIn).unwrap();
        assert_eq!(json, "\"checked_in\"");
    }
}
