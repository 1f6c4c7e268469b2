//! Reservation service implementation
//!
//! Booking, cancellation and the admin reservation views. Seat accounting is
//! delegated to the repository so it stays atomic under concurrent requests.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use csv::Writer;
use tracing::warn;
use uuid::Uuid;

use crate::config::LimitsConfig;
use crate::database::DatabaseService;
use crate::models::{
    AdminReservationList, AdminReservationQuery, AdminReservationView, BulkActionResult,
    BulkReservationActionRequest, CheckinContext, CheckinMethod, CreateReservationRequest, Event, EventBrief,
    ExportFormat, MyReservationsQuery, NewReservation, PageParams, Reservation, ReservationBulkAction,
    ReservationCreated, ReservationMetrics, ReservationOutcome, ReservationSortField, ReservationStatus,
    ReservationWithEvent, StatusTransition, User, UserBrief,
};
use crate::services::cache::{CacheService, DASHBOARD_STATS_KEY};
use crate::services::live::{LiveMetricsHub, LiveUpdate};
use crate::services::notification::NotificationService;
use crate::utils::errors::{CulturalCenterError, Result};
use crate::utils::helpers::{format_hhmm, generate_checkin_code, percentage};
use crate::utils::logging::{log_admin_action, log_reservation_action};

const CODE_ATTEMPTS: usize = 5;

/// Rendered export
#[derive(Debug, Clone)]
pub enum ReservationExport {
    Csv { filename: String, body: String },
    Json(Vec<AdminReservationView>),
}

#[derive(Debug, Clone)]
pub struct ReservationService {
    db: DatabaseService,
    limits: LimitsConfig,
    cache: CacheService,
    notifications: NotificationService,
    hub: Arc<LiveMetricsHub>,
}

impl ReservationService {
    pub fn new(
        db: DatabaseService,
        limits: LimitsConfig,
        cache: CacheService,
        notifications: NotificationService,
        hub: Arc<LiveMetricsHub>,
    ) -> Self {
        Self {
            db,
            limits,
            cache,
            notifications,
            hub,
        }
    }

    /// Reserve a seat for the caller
    pub async fn create(&self, user: &User, request: CreateReservationRequest) -> Result<ReservationCreated> {
        let event_id = request.event_id;
        let event = match self.db.events.find_by_id(event_id).await? {
            Some(event) if event.published => event,
            _ => return Err(CulturalCenterError::EventNotFound { event_id }),
        };
        if event.date < Utc::now().date_naive() {
            return Err(CulturalCenterError::InvalidInput("Cannot reserve a past event".to_string()));
        }

        let notes = request.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        for _ in 0..CODE_ATTEMPTS {
            let new = NewReservation {
                user_id: user.id,
                event_id,
                checkin_code: generate_checkin_code(),
                notes: notes.clone(),
            };

            let reservation = match self
                .db
                .reservations
                .create_if_available(new, self.limits.max_reservations_per_user)
                .await?
            {
                ReservationOutcome::Created(reservation) => reservation,
                ReservationOutcome::CodeCollision => {
                    warn!(event_id = %event_id, "Check-in code collision, regenerating");
                    continue;
                }
                ReservationOutcome::EventNotFound => return Err(CulturalCenterError::EventNotFound { event_id }),
                ReservationOutcome::AlreadyReserved => {
                    return Err(CulturalCenterError::InvalidInput(
                        "You already have a reservation for this event".to_string(),
                    ))
                }
                ReservationOutcome::EventFull => {
                    return Err(CulturalCenterError::InvalidInput("Event is fully booked".to_string()))
                }
                ReservationOutcome::UserLimitReached => {
                    return Err(CulturalCenterError::InvalidInput("Reservation limit reached".to_string()))
                }
            };

            log_reservation_action(reservation.id, "created", user.id, event_id);
            self.notifications.notify_reservation_confirmed(user, &event, &reservation);
            self.after_change(LiveUpdate::Reservation).await;

            return Ok(ReservationCreated {
                qr_payload: reservation.qr_payload(),
                event_title: event.title,
                reservation,
            });
        }

        Err(CulturalCenterError::Internal("Could not allocate a unique check-in code".to_string()))
    }

    async fn after_change(&self, update: LiveUpdate) {
        self.cache.invalidate(DASHBOARD_STATS_KEY).await;
        self.hub.publish(update);
    }

    /// The caller's reservations, newest first
    pub async fn list_mine(&self, user: &User, query: MyReservationsQuery) -> Result<Vec<ReservationWithEvent>> {
        let reservations: Vec<Reservation> = self
            .db
            .reservations
            .list_for_user(user.id)
            .await?
            .into_iter()
            .filter(|r| query.status_filter.map_or(true, |s| r.status == s))
            .collect();

        let events = self.events_by_id(reservations.iter().map(|r| r.event_id)).await?;
        Ok(reservations
            .into_iter()
            .map(|reservation| ReservationWithEvent {
                event: events.get(&reservation.event_id).map(EventBrief::from),
                reservation,
            })
            .collect())
    }

    /// A reservation visible to its owner or an admin
    pub async fn get(&self, reservation_id: Uuid, user: &User) -> Result<ReservationWithEvent> {
        let reservation = self.find_owned(reservation_id, user).await?;
        let event = self.db.events.find_by_id(reservation.event_id).await?;
        Ok(ReservationWithEvent {
            event: event.as_ref().map(EventBrief::from),
            reservation,
        })
    }

    async fn find_owned(&self, reservation_id: Uuid, user: &User) -> Result<Reservation> {
        match self.db.reservations.find_by_id(reservation_id).await? {
            Some(r) if r.user_id == user.id || user.is_admin => Ok(r),
            _ => Err(CulturalCenterError::ReservationNotFound { reservation_id }),
        }
    }

    /// Cancel by the owner (or an admin acting through the same route)
    pub async fn cancel(&self, reservation_id: Uuid, user: &User) -> Result<Reservation> {
        self.find_owned(reservation_id, user).await?;
        self.cancel_checked(reservation_id, user.id, user.is_admin).await
    }

    /// Admin cancel; checked-in reservations may be cancelled too
    pub async fn admin_cancel(&self, reservation_id: Uuid, admin_id: Uuid) -> Result<Reservation> {
        let reservation = self.cancel_checked(reservation_id, admin_id, true).await?;
        log_admin_action(admin_id, "cancel_reservation", Some(&reservation_id.to_string()), None);
        Ok(reservation)
    }

    async fn cancel_checked(&self, reservation_id: Uuid, actor_id: Uuid, allow_checked_in: bool) -> Result<Reservation> {
        let reservation = match self.db.reservations.cancel(reservation_id, allow_checked_in, Utc::now()).await? {
            StatusTransition::Applied(reservation) => reservation,
            StatusTransition::NotFound => return Err(CulturalCenterError::ReservationNotFound { reservation_id }),
            StatusTransition::Rejected(ReservationStatus::Cancelled) => {
                return Err(CulturalCenterError::InvalidInput("Reservation is already cancelled".to_string()))
            }
            StatusTransition::Rejected(_) => {
                return Err(CulturalCenterError::InvalidInput(
                    "Cannot cancel a reservation that has already been checked in".to_string(),
                ))
            }
        };

        log_reservation_action(reservation.id, "cancelled", actor_id, reservation.event_id);
        self.notify_cancelled(&reservation).await;
        self.after_change(LiveUpdate::Reservation).await;
        Ok(reservation)
    }

    async fn notify_cancelled(&self, reservation: &Reservation) {
        let user = self.db.users.find_by_id(reservation.user_id).await;
        let event = self.db.events.find_by_id(reservation.event_id).await;
        if let (Ok(Some(user)), Ok(Some(event))) = (user, event) {
            self.notifications.notify_cancelled(&user, &event);
        }
    }

    async fn events_by_id(&self, ids: impl Iterator<Item = Uuid>) -> Result<HashMap<Uuid, Event>> {
        let mut ids: Vec<Uuid> = ids.collect();
        ids.sort();
        ids.dedup();
        Ok(self.db.events.find_many(&ids).await?.into_iter().map(|e| (e.id, e)).collect())
    }

    async fn users_by_id(&self, ids: impl Iterator<Item = Uuid>) -> Result<HashMap<Uuid, User>> {
        let mut ids: Vec<Uuid> = ids.collect();
        ids.sort();
        ids.dedup();
        Ok(self.db.users.find_many(&ids).await?.into_iter().map(|u| (u.id, u)).collect())
    }

    /// Every reservation joined with its user and event, newest first
    async fn all_views(&self) -> Result<Vec<(AdminReservationView, Option<Event>, Option<User>)>> {
        let reservations = self.db.reservations.list_all().await?;
        let events = self.events_by_id(reservations.iter().map(|r| r.event_id)).await?;
        let users = self.users_by_id(reservations.iter().map(|r| r.user_id)).await?;

        Ok(reservations
            .into_iter()
            .map(|reservation| {
                let event = events.get(&reservation.event_id).cloned();
                let user = users.get(&reservation.user_id).cloned();
                let view = AdminReservationView {
                    user: user.as_ref().map(UserBrief::from),
                    event: event.as_ref().map(EventBrief::from),
                    reservation,
                };
                (view, event, user)
            })
            .collect())
    }

    pub async fn admin_list(&self, query: AdminReservationQuery) -> Result<AdminReservationList> {
        let params = PageParams::new(query.skip, query.limit).validated()?;

        let event_filter = query.event_filter.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let event_id_filter = event_filter.and_then(|f| Uuid::parse_str(f).ok());
        let event_title_filter = event_filter.map(str::to_lowercase);
        let user_search = query
            .user_search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut rows: Vec<_> = self
            .all_views()
            .await?
            .into_iter()
            .filter(|(view, _, _)| query.status_filter.map_or(true, |s| view.reservation.status == s))
            .filter(|(view, event, _)| match (&event_id_filter, &event_title_filter) {
                (Some(id), _) => view.reservation.event_id == *id,
                (None, Some(title)) => event.as_ref().is_some_and(|e| e.title.to_lowercase().contains(title)),
                (None, None) => true,
            })
            .filter(|(_, _, user)| match &user_search {
                Some(needle) => user.as_ref().is_some_and(|u| {
                    u.name.to_lowercase().contains(needle)
                        || u.email.to_lowercase().contains(needle)
                        || u.phone.as_deref().is_some_and(|p| p.contains(needle.as_str()))
                }),
                None => true,
            })
            .collect();

        rows.sort_by(|(a, ae, au), (b, be, bu)| {
            let ordering = match query.sort_by {
                ReservationSortField::CreatedAt => a.reservation.created_at.cmp(&b.reservation.created_at),
                ReservationSortField::EventDate => ae
                    .as_ref()
                    .map(|e| (e.date, e.time))
                    .cmp(&be.as_ref().map(|e| (e.date, e.time))),
                ReservationSortField::UserName => au
                    .as_ref()
                    .map(|u| u.name.to_lowercase())
                    .cmp(&bu.as_ref().map(|u| u.name.to_lowercase())),
                ReservationSortField::Status => a.reservation.status.as_str().cmp(b.reservation.status.as_str()),
            };
            query.sort_order.apply(ordering.then_with(|| a.reservation.id.cmp(&b.reservation.id)))
        });

        let total = rows.len() as i64;
        let reservations = params.slice(rows).into_iter().map(|(view, _, _)| view).collect();

        Ok(AdminReservationList {
            reservations,
            total,
            skip: params.skip,
            limit: params.limit,
        })
    }

    pub async fn metrics(&self) -> Result<ReservationMetrics> {
        let reservations = self.db.reservations.list_all().await?;
        let today = Utc::now().date_naive();
        let count = |status: ReservationStatus| reservations.iter().filter(|r| r.status == status).count() as i64;

        let checked_in = count(ReservationStatus::CheckedIn);
        let cancelled = count(ReservationStatus::Cancelled);
        let total = reservations.len() as i64;

        Ok(ReservationMetrics {
            total_reservations: total,
            confirmed_reservations: count(ReservationStatus::Confirmed),
            checked_in_reservations: checked_in,
            cancelled_reservations: cancelled,
            pending_reservations: count(ReservationStatus::Pending),
            today_reservations: reservations.iter().filter(|r| r.created_at.date_naive() == today).count() as i64,
            attendance_rate: percentage(checked_in, total - cancelled),
        })
    }

    /// Apply a check-in or cancel to many reservations; invalid transitions are skipped
    pub async fn bulk_action(&self, request: BulkReservationActionRequest, admin_id: Uuid) -> Result<BulkActionResult> {
        let now = Utc::now();
        let mut affected = 0u64;

        for id in &request.reservation_ids {
            let transition = match request.action {
                ReservationBulkAction::Checkin => {
                    let context = CheckinContext {
                        method: CheckinMethod::Manual,
                        staff_id: Some(admin_id),
                        at: now,
                    };
                    self.db.reservations.check_in(*id, context).await?
                }
                ReservationBulkAction::Cancel => self.db.reservations.cancel(*id, true, now).await?,
            };
            if matches!(transition, StatusTransition::Applied(_)) {
                affected += 1;
            }
        }

        let (verb, update) = match request.action {
            ReservationBulkAction::Checkin => ("checked in", LiveUpdate::Checkin),
            ReservationBulkAction::Cancel => ("cancelled", LiveUpdate::Reservation),
        };
        log_admin_action(
            admin_id,
            "bulk_reservation_action",
            None,
            Some(&format!("{} {} of {}", verb, affected, request.reservation_ids.len())),
        );
        if affected > 0 {
            self.after_change(update).await;
        }

        Ok(BulkActionResult {
            message: format!("{} reservations {}", affected, verb),
            affected_count: affected,
        })
    }

    pub async fn export(&self, format: ExportFormat) -> Result<ReservationExport> {
        match format {
            ExportFormat::Excel => Err(CulturalCenterError::InvalidInput("Unsupported export format".to_string())),
            ExportFormat::Json => Ok(ReservationExport::Json(
                self.all_views().await?.into_iter().map(|(view, _, _)| view).collect(),
            )),
            ExportFormat::Csv => {
                let rows = self.all_views().await?;
                let mut writer = Writer::from_writer(Vec::new());
                writer.write_record([
                    "reservation_id",
                    "checkin_code",
                    "status",
                    "user_name",
                    "user_email",
                    "user_phone",
                    "event_title",
                    "event_date",
                    "event_time",
                    "event_location",
                    "created_at",
                    "checked_in_at",
                    "cancelled_at",
                ])?;

                for (view, event, user) in &rows {
                    let r = &view.reservation;
                    writer.write_record([
                        r.id.to_string(),
                        r.checkin_code.clone(),
                        r.status.as_str().to_string(),
                        user.as_ref().map(|u| u.name.clone()).unwrap_or_default(),
                        user.as_ref().map(|u| u.email.clone()).unwrap_or_default(),
                        user.as_ref().and_then(|u| u.phone.clone()).unwrap_or_default(),
                        event.as_ref().map(|e| e.title.clone()).unwrap_or_default(),
                        event.as_ref().map(|e| e.date.to_string()).unwrap_or_default(),
                        event.as_ref().map(|e| format_hhmm(e.time)).unwrap_or_default(),
                        event.as_ref().map(|e| e.location.clone()).unwrap_or_default(),
                        r.created_at.to_rfc3339(),
                        r.checked_in_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                        r.cancelled_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    ])?;
                }

                let bytes = writer
                    .into_inner()
                    .map_err(|e| CulturalCenterError::Internal(format!("CSV export failed: {}", e)))?;
                let body = String::from_utf8(bytes)
                    .map_err(|e| CulturalCenterError::Internal(format!("CSV export failed: {}", e)))?;

                Ok(ReservationExport::Csv {
                    filename: format!("reservations_{}.csv", Utc::now().format("%Y%m%d")),
                    body,
                })
            }
        }
    }
}
