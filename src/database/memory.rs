//! In-memory storage
//!
//! Implements every repository trait over process-local maps guarded by a single
//! lock, so multi-row checks (seat counting, uniqueness) are atomic the same way
//! the Postgres transactions are. Used by the test-suite and by
//! `database.backend = "memory"`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repositories::{AnalyticsRepository, EventRepository, ReservationRepository, UserRepository};
use crate::models::analytics::{AnalyticsEvent, NewAnalyticsEvent};
use crate::models::common::Page;
use crate::models::event::{Event, EventChanges, EventFilter, EventUpdateOutcome, NewEvent};
use crate::models::reservation::{
    Checkin, CheckinContext, NewReservation, Reservation, ReservationOutcome, ReservationStatus,
    StatusTransition,
};
use crate::models::user::{NewUser, User, UserChanges, UserQuery, UserStatus};
use crate::utils::errors::{CulturalCenterError, Result};
use crate::utils::helpers::normalize_phone;

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    reservations: HashMap<Uuid, Reservation>,
    checkins: Vec<Checkin>,
    analytics: Vec<AnalyticsEvent>,
}

impl MemoryState {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id) != except)
    }

    fn active_for_event(&self, event_id: Uuid) -> i64 {
        self.reservations
            .values()
            .filter(|r| r.event_id == event_id && r.status.is_active())
            .count() as i64
    }

    fn transition_rejection(&self, id: Uuid) -> StatusTransition {
        match self.reservations.get(&id) {
            Some(r) => StatusTransition::Rejected(r.status),
            None => StatusTransition::NotFound,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.write().await;
        if state.email_taken(&user.email, None) {
            return Err(CulturalCenterError::Conflict("Email already registered".to_string()));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            phone: user.phone,
            age: user.age,
            location: user.location,
            password_hash: user.password_hash,
            is_admin: user.is_admin,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
            last_login: None,
        };
        state.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn find_by_phone(&self, phone_digits: &str) -> Result<Vec<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|u| !u.is_deleted())
            .filter(|u| u.phone.as_deref().is_some_and(|p| normalize_phone(p) == phone_digits))
            .cloned()
            .collect())
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>> {
        let mut state = self.state.write().await;
        if let Some(email) = changes.email.as_deref() {
            if state.email_taken(email, Some(id)) {
                return Err(CulturalCenterError::Conflict("Email already registered".to_string()));
            }
        }

        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(phone) = changes.phone {
            user.phone = Some(phone);
        }
        if let Some(age) = changes.age {
            user.age = Some(age);
        }
        if let Some(location) = changes.location {
            user.location = Some(location);
        }
        if let Some(is_admin) = changes.is_admin {
            user.is_admin = is_admin;
        }
        if let Some(status) = changes.status {
            user.status = status;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(last_login) = changes.last_login {
            user.last_login = Some(last_login);
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_status(&self, ids: &[Uuid], status: UserStatus) -> Result<u64> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut changed = 0;
        for id in ids {
            if let Some(user) = state.users.get_mut(id) {
                if user.status != status {
                    user.status = status;
                    user.updated_at = now;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn set_admin(&self, ids: &[Uuid], is_admin: bool) -> Result<u64> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut changed = 0;
        for id in ids {
            if let Some(user) = state.users.get_mut(id) {
                if user.is_admin != is_admin && !user.is_deleted() {
                    user.is_admin = is_admin;
                    user.updated_at = now;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn list(&self, query: &UserQuery) -> Result<Page<User>> {
        let state = self.state.read().await;
        let mut matching: Vec<User> = state.users.values().filter(|u| query.matches(u)).cloned().collect();
        matching.sort_by(|a, b| query.compare(a, b));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(query.skip.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect();
        Ok(Page { items, total })
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn create(&self, event: NewEvent) -> Result<Event> {
        let now = Utc::now();
        let created = Event {
            id: Uuid::new_v4(),
            title: event.title,
            description: event.description,
            category: event.category,
            date: event.date,
            time: event.time,
            capacity: event.capacity,
            location: event.location,
            image_url: event.image_url,
            price: event.price,
            tags: event.tags,
            requirements: event.requirements,
            contact_info: event.contact_info,
            published: event.published,
            created_by: event.created_by,
            created_at: now,
            updated_at: now,
        };
        self.state.write().await.events.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>> {
        Ok(self.state.read().await.events.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Event>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.events.get(id).cloned()).collect())
    }

    async fn list(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let state = self.state.read().await;
        let mut events: Vec<Event> = state.events.values().filter(|e| filter.matches(e)).cloned().collect();
        events.sort_by(|a, b| (a.date, a.time, a.created_at).cmp(&(b.date, b.time, b.created_at)));
        Ok(events)
    }

    async fn update(&self, id: Uuid, changes: EventChanges) -> Result<EventUpdateOutcome> {
        let mut state = self.state.write().await;
        if !state.events.contains_key(&id) {
            return Ok(EventUpdateOutcome::NotFound);
        }
        if let Some(capacity) = changes.capacity {
            let active = state.active_for_event(id);
            if (capacity as i64) < active {
                return Ok(EventUpdateOutcome::CapacityBelowReservations { active });
            }
        }

        let Some(event) = state.events.get_mut(&id) else {
            return Ok(EventUpdateOutcome::NotFound);
        };
        if let Some(title) = changes.title {
            event.title = title;
        }
        if let Some(description) = changes.description {
            event.description = description;
        }
        if let Some(category) = changes.category {
            event.category = category;
        }
        if let Some(date) = changes.date {
            event.date = date;
        }
        if let Some(time) = changes.time {
            event.time = time;
        }
        if let Some(capacity) = changes.capacity {
            event.capacity = capacity;
        }
        if let Some(location) = changes.location {
            event.location = location;
        }
        if let Some(image_url) = changes.image_url {
            event.image_url = Some(image_url);
        }
        if let Some(price) = changes.price {
            event.price = price;
        }
        if let Some(tags) = changes.tags {
            event.tags = tags;
        }
        if let Some(requirements) = changes.requirements {
            event.requirements = Some(requirements);
        }
        if let Some(contact_info) = changes.contact_info {
            event.contact_info = Some(contact_info);
        }
        if let Some(published) = changes.published {
            event.published = published;
        }
        event.updated_at = Utc::now();
        Ok(EventUpdateOutcome::Updated(event.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.events.remove(&id).is_none() {
            return Ok(false);
        }
        state.reservations.retain(|_, r| r.event_id != id);
        state.checkins.retain(|c| c.event_id != id);
        Ok(true)
    }
}

#[async_trait]
impl ReservationRepository for MemoryStore {
    async fn create_if_available(&self, new: NewReservation, max_open_per_user: i64) -> Result<ReservationOutcome> {
        let mut state = self.state.write().await;

        let Some(capacity) = state.events.get(&new.event_id).map(|e| e.capacity) else {
            return Ok(ReservationOutcome::EventNotFound);
        };
        if state
            .reservations
            .values()
            .any(|r| r.user_id == new.user_id && r.event_id == new.event_id && r.status.is_active())
        {
            return Ok(ReservationOutcome::AlreadyReserved);
        }
        if state.active_for_event(new.event_id) >= capacity as i64 {
            return Ok(ReservationOutcome::EventFull);
        }
        let open = state
            .reservations
            .values()
            .filter(|r| r.user_id == new.user_id && r.status.is_checkin_eligible())
            .count() as i64;
        if open >= max_open_per_user {
            return Ok(ReservationOutcome::UserLimitReached);
        }
        if state.reservations.values().any(|r| r.checkin_code == new.checkin_code) {
            return Ok(ReservationOutcome::CodeCollision);
        }

        let now = Utc::now();
        let reservation = Reservation {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            event_id: new.event_id,
            status: ReservationStatus::Confirmed,
            checkin_code: new.checkin_code,
            notes: new.notes,
            created_at: now,
            updated_at: now,
            checked_in_at: None,
            cancelled_at: None,
        };
        state.reservations.insert(reservation.id, reservation.clone());
        Ok(ReservationOutcome::Created(reservation))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Reservation>> {
        Ok(self.state.read().await.reservations.get(&id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Reservation>> {
        let state = self.state.read().await;
        Ok(state.reservations.values().find(|r| r.checkin_code == code).cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Reservation>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.reservations.get(id).cloned()).collect())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Reservation>> {
        let state = self.state.read().await;
        let mut reservations: Vec<Reservation> =
            state.reservations.values().filter(|r| r.user_id == user_id).cloned().collect();
        reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reservations)
    }

    async fn list_for_event(&self, event_id: Uuid) -> Result<Vec<Reservation>> {
        let state = self.state.read().await;
        let mut reservations: Vec<Reservation> =
            state.reservations.values().filter(|r| r.event_id == event_id).cloned().collect();
        reservations.sort_by_key(|r| r.created_at);
        Ok(reservations)
    }

    async fn list_all(&self) -> Result<Vec<Reservation>> {
        let state = self.state.read().await;
        let mut reservations: Vec<Reservation> = state.reservations.values().cloned().collect();
        reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reservations)
    }

    async fn count_active_by_event(&self) -> Result<HashMap<Uuid, i64>> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for reservation in state.reservations.values().filter(|r| r.status.is_active()) {
            *counts.entry(reservation.event_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn count_active_for_event(&self, event_id: Uuid) -> Result<i64> {
        Ok(self.state.read().await.active_for_event(event_id))
    }

    async fn cancel(&self, id: Uuid, allow_checked_in: bool, at: DateTime<Utc>) -> Result<StatusTransition> {
        let mut state = self.state.write().await;
        let eligible = match state.reservations.get(&id).map(|r| r.status) {
            Some(status) => status.is_checkin_eligible() || (allow_checked_in && status == ReservationStatus::CheckedIn),
            None => false,
        };
        if !eligible {
            return Ok(state.transition_rejection(id));
        }

        let Some(reservation) = state.reservations.get_mut(&id) else {
            return Ok(StatusTransition::NotFound);
        };
        reservation.status = ReservationStatus::Cancelled;
        reservation.cancelled_at = Some(at);
        reservation.updated_at = at;
        Ok(StatusTransition::Applied(reservation.clone()))
    }

    async fn check_in(&self, id: Uuid, context: CheckinContext) -> Result<StatusTransition> {
        let mut state = self.state.write().await;
        let eligible = state.reservations.get(&id).is_some_and(|r| r.status.is_checkin_eligible());
        if !eligible {
            return Ok(state.transition_rejection(id));
        }

        let Some(reservation) = state.reservations.get_mut(&id) else {
            return Ok(StatusTransition::NotFound);
        };
        reservation.status = ReservationStatus::CheckedIn;
        reservation.checked_in_at = Some(context.at);
        reservation.updated_at = context.at;
        let updated = reservation.clone();

        state.checkins.push(Checkin {
            id: Uuid::new_v4(),
            reservation_id: updated.id,
            user_id: updated.user_id,
            event_id: updated.event_id,
            method: context.method,
            checked_in_by: context.staff_id,
            checked_in_at: context.at,
        });
        Ok(StatusTransition::Applied(updated))
    }

    async fn cancel_open_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut cancelled = 0;
        for reservation in state.reservations.values_mut() {
            if reservation.user_id == user_id && reservation.status.is_checkin_eligible() {
                reservation.status = ReservationStatus::Cancelled;
                reservation.cancelled_at = Some(at);
                reservation.updated_at = at;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    async fn list_checkins(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Checkin>> {
        let state = self.state.read().await;
        let mut checkins: Vec<Checkin> = state
            .checkins
            .iter()
            .filter(|c| since.map_or(true, |since| c.checked_in_at >= since))
            .cloned()
            .collect();
        checkins.sort_by(|a, b| b.checked_in_at.cmp(&a.checked_in_at));
        Ok(checkins)
    }
}

#[async_trait]
impl AnalyticsRepository for MemoryStore {
    async fn record(&self, event: NewAnalyticsEvent) -> Result<AnalyticsEvent> {
        let recorded = AnalyticsEvent {
            id: Uuid::new_v4(),
            event_type: event.event_type,
            user_id: event.user_id,
            metadata: event.metadata,
            created_at: Utc::now(),
        };
        self.state.write().await.analytics.push(recorded.clone());
        Ok(recorded)
    }

    async fn list_since(&self, since: DateTime<Utc>, event_type: Option<&str>) -> Result<Vec<AnalyticsEvent>> {
        let state = self.state.read().await;
        Ok(state
            .analytics
            .iter()
            .filter(|e| e.created_at >= since)
            .filter(|e| event_type.map_or(true, |t| e.event_type == t))
            .cloned()
            .collect())
    }
}
