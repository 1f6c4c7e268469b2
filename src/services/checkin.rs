//! Check-in service implementation
//!
//! Resolves whatever the door staff typed or scanned (QR payload, check-in
//! code, email or phone) to a reservation and marks it as attended.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::database::DatabaseService;
use crate::models::{
    CheckInRequest, CheckInResponse, CheckinContext, CheckinMethod, Event, Reservation, ReservationStatus,
    StatusTransition, User,
};
use crate::services::cache::{CacheService, DASHBOARD_STATS_KEY};
use crate::services::live::{LiveMetricsHub, LiveUpdate};
use crate::services::notification::NotificationService;
use crate::utils::errors::{CulturalCenterError, Result};
use crate::utils::helpers::{is_checkin_code, normalize_email, normalize_phone};
use crate::utils::logging::log_checkin;

const QR_PREFIX: &str = "reservation:";
const MIN_PHONE_DIGITS: usize = 7;

/// Parsed form of a check-in identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    ReservationId(Uuid),
    Email(String),
    Code(String),
    Phone(String),
}

impl Identifier {
    /// Classify raw input; `None` when it matches no known shape
    pub fn parse(raw: &str) -> Option<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }

        if let Some(rest) = text.strip_prefix(QR_PREFIX) {
            return Uuid::parse_str(rest.trim()).ok().map(Identifier::ReservationId);
        }
        if text.contains('@') {
            return Some(Identifier::Email(normalize_email(text)));
        }

        let upper = text.to_uppercase();
        if is_checkin_code(&upper) {
            return Some(Identifier::Code(upper));
        }

        let digits = normalize_phone(text);
        if digits.len() >= MIN_PHONE_DIGITS {
            return Some(Identifier::Phone(digits));
        }
        None
    }

    pub fn method(&self) -> CheckinMethod {
        match self {
            Identifier::ReservationId(_) => CheckinMethod::ReservationId,
            Identifier::Email(_) => CheckinMethod::Email,
            Identifier::Code(_) => CheckinMethod::Code,
            Identifier::Phone(_) => CheckinMethod::Phone,
        }
    }

    fn kind(&self) -> &'static str {
        self.method().as_str()
    }
}

#[derive(Debug, Clone)]
pub struct CheckinService {
    db: DatabaseService,
    cache: CacheService,
    notifications: NotificationService,
    hub: Arc<LiveMetricsHub>,
}

impl CheckinService {
    pub fn new(
        db: DatabaseService,
        cache: CacheService,
        notifications: NotificationService,
        hub: Arc<LiveMetricsHub>,
    ) -> Self {
        Self {
            db,
            cache,
            notifications,
            hub,
        }
    }

    /// Check in by free-form identifier
    pub async fn check_in(&self, request: CheckInRequest, staff_id: Uuid) -> Result<CheckInResponse> {
        let identifier = Identifier::parse(&request.identifier).ok_or_else(not_found)?;
        let kind = identifier.kind();

        let reservation = match self.resolve(&identifier, request.event_id).await {
            Ok(reservation) => reservation,
            Err(e) => {
                log_checkin(kind, None, false, Some(&e.to_string()));
                return Err(e);
            }
        };

        self.apply(reservation, identifier.method(), staff_id).await
    }

    /// Check in a known reservation
    pub async fn check_in_by_id(&self, reservation_id: Uuid, staff_id: Uuid) -> Result<CheckInResponse> {
        let reservation = self
            .db
            .reservations
            .find_by_id(reservation_id)
            .await?
            .ok_or(CulturalCenterError::ReservationNotFound { reservation_id })?;

        self.apply(reservation, CheckinMethod::Manual, staff_id).await
    }

    async fn resolve(&self, identifier: &Identifier, event_id: Option<Uuid>) -> Result<Reservation> {
        let in_event = |r: &Reservation| event_id.map_or(true, |id| r.event_id == id);

        match identifier {
            Identifier::ReservationId(id) => self
                .db
                .reservations
                .find_by_id(*id)
                .await?
                .filter(|r| in_event(r))
                .ok_or_else(not_found),
            Identifier::Code(code) => self
                .db
                .reservations
                .find_by_code(code)
                .await?
                .filter(|r| in_event(r))
                .ok_or_else(not_found),
            Identifier::Email(email) => {
                let users: Vec<User> = self
                    .db
                    .users
                    .find_by_email(email)
                    .await?
                    .filter(|u| !u.is_deleted())
                    .into_iter()
                    .collect();
                self.best_for_users(&users, event_id).await
            }
            Identifier::Phone(digits) => {
                let users = self.db.users.find_by_phone(digits).await?;
                self.best_for_users(&users, event_id).await
            }
        }
    }

    /// Pick the reservation whose event date is closest to today among the users' reservations
    async fn best_for_users(&self, users: &[User], event_id: Option<Uuid>) -> Result<Reservation> {
        let mut candidates = Vec::new();
        for user in users {
            candidates.extend(
                self.db
                    .reservations
                    .list_for_user(user.id)
                    .await?
                    .into_iter()
                    .filter(|r| event_id.map_or(true, |id| r.event_id == id)),
            );
        }
        if candidates.is_empty() {
            return Err(not_found());
        }

        let event_ids: Vec<Uuid> = candidates.iter().map(|r| r.event_id).collect();
        let events = self.db.events.find_many(&event_ids).await?;
        let event_date = |r: &Reservation| events.iter().find(|e| e.id == r.event_id).map(|e| e.date);

        let today = Utc::now().date_naive();
        let best = candidates
            .iter()
            .filter(|r| r.status.is_checkin_eligible())
            .min_by_key(|r| date_rank(event_date(r), today));

        match best {
            Some(reservation) => Ok(reservation.clone()),
            None if candidates.iter().any(|r| r.status == ReservationStatus::CheckedIn) => {
                Err(CulturalCenterError::InvalidInput("Already checked in".to_string()))
            }
            None => Err(CulturalCenterError::InvalidInput(
                "Cannot check in to a cancelled reservation".to_string(),
            )),
        }
    }

    async fn apply(&self, reservation: Reservation, method: CheckinMethod, staff_id: Uuid) -> Result<CheckInResponse> {
        let context = CheckinContext {
            method,
            staff_id: Some(staff_id),
            at: Utc::now(),
        };

        let reservation = match self.db.reservations.check_in(reservation.id, context).await? {
            StatusTransition::Applied(reservation) => reservation,
            StatusTransition::NotFound => return Err(not_found()),
            StatusTransition::Rejected(status) => {
                let message = match status {
                    ReservationStatus::CheckedIn => "Already checked in",
                    _ => "Cannot check in to a cancelled reservation",
                };
                log_checkin(method.as_str(), Some(reservation.id), false, Some(message));
                return Err(CulturalCenterError::InvalidInput(message.to_string()));
            }
        };

        let user = self.db.users.find_by_id(reservation.user_id).await?;
        let event = self.db.events.find_by_id(reservation.event_id).await?;

        log_checkin(method.as_str(), Some(reservation.id), true, None);
        if let (Some(user), Some(event)) = (&user, &event) {
            self.notifications.notify_checked_in(user, event);
        }
        self.cache.invalidate(DASHBOARD_STATS_KEY).await;
        self.hub.publish(LiveUpdate::Checkin);

        Ok(response(&reservation, user.as_ref(), event.as_ref()))
    }
}

fn not_found() -> CulturalCenterError {
    CulturalCenterError::NotFound("No valid reservation found for this identifier".to_string())
}

/// Ordering key: today first, then upcoming (soonest first), then past (most recent first)
fn date_rank(date: Option<NaiveDate>, today: NaiveDate) -> (u8, i64) {
    match date {
        Some(d) if d == today => (0, 0),
        Some(d) if d > today => (1, (d - today).num_days()),
        Some(d) => (2, (today - d).num_days()),
        None => (3, 0),
    }
}

fn response(reservation: &Reservation, user: Option<&User>, event: Option<&Event>) -> CheckInResponse {
    let user_name = user.map(|u| u.name.clone()).unwrap_or_default();
    CheckInResponse {
        message: format!("Check-in successful for {}", user_name),
        reservation_id: reservation.id,
        user_name,
        user_email: user.map(|u| u.email.clone()).unwrap_or_default(),
        event_title: event.map(|e| e.title.clone()).unwrap_or_default(),
        checked_in_at: reservation.checked_in_at.unwrap_or(reservation.updated_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_identifier_classification() {
        let id = Uuid::new_v4();
        assert_eq!(
            Identifier::parse(&format!("reservation:{}", id)),
            Some(Identifier::ReservationId(id))
        );
        assert_eq!(
            Identifier::parse(" Ana@Example.com "),
            Some(Identifier::Email("ana@example.com".to_string()))
        );
        assert_eq!(Identifier::parse("abcd2345"), Some(Identifier::Code("ABCD2345".to_string())));
        assert_eq!(
            Identifier::parse("(809) 555-0101"),
            Some(Identifier::Phone("8095550101".to_string()))
        );
        assert_eq!(Identifier::parse("hola"), None);
        assert_eq!(Identifier::parse("reservation:not-a-uuid"), None);
    }

    #[test]
    fn test_codes_with_ambiguous_glyphs_fall_through() {
        // O and 0 are not in the code alphabet, so this is treated as a phone number
        assert_eq!(Identifier::parse("80955501"), Some(Identifier::Phone("80955501".to_string())));
        assert_eq!(Identifier::parse("ABCDEFGO"), None);
    }

    #[test]
    fn test_date_rank_prefers_today_then_upcoming() {
        let today = NaiveDate::from_ymd_opt(2030, 1, 10).unwrap();
        let tomorrow = today + Duration::days(1);
        let next_week = today + Duration::days(7);
        let yesterday = today - Duration::days(1);

        let mut dates = vec![Some(yesterday), Some(next_week), Some(today), Some(tomorrow)];
        dates.sort_by_key(|d| date_rank(*d, today));
        assert_eq!(dates, vec![Some(today), Some(tomorrow), Some(next_week), Some(yesterday)]);
    }
}
