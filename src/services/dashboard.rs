//! Dashboard service
//!
//! Headline counters, the activity feed and chart series for the admin dashboard.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::config::Settings;
use crate::database::DatabaseService;
use crate::models::{
    ActivityItem, ActivityKind, AdminStats, CategoryDistribution, Checkin, CountPair, DashboardStats, Event,
    EventCategory, EventCounts, EventFilter, MonthlyAttendancePoint, OccupancyRate, QuickStats, Reservation,
    ReservationStatus, SystemStatus, User, WeeklyTrendPoint,
};
use crate::services::cache::{CacheService, DASHBOARD_STATS_KEY};
use crate::services::event::top_events;
use crate::utils::errors::Result;
use crate::utils::helpers::{is_same_day, percentage, round2};

const POPULAR_EVENTS: usize = 5;
const RECENT_ACTIVITY: usize = 10;
const CHART_MONTHS: u32 = 6;
const TREND_DAYS: i64 = 7;
const OCCUPANCY_EVENTS: usize = 10;

/// Everything the dashboard numbers are computed from
struct Snapshot {
    users: Vec<User>,
    events: Vec<Event>,
    reservations: Vec<Reservation>,
    checkins: Vec<Checkin>,
}

impl Snapshot {
    fn events_by_id(&self) -> HashMap<Uuid, &Event> {
        self.events.iter().map(|e| (e.id, e)).collect()
    }

    fn users_by_id(&self) -> HashMap<Uuid, &User> {
        self.users.iter().map(|u| (u.id, u)).collect()
    }

    fn live_users(&self) -> impl Iterator<Item = &User> {
        self.users.iter().filter(|u| !u.is_deleted())
    }

    fn active_reservations(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.iter().filter(|r| r.status.is_active())
    }

    fn active_counts(&self) -> HashMap<Uuid, i64> {
        let mut counts = HashMap::new();
        for reservation in self.active_reservations() {
            *counts.entry(reservation.event_id).or_insert(0) += 1;
        }
        counts
    }

    /// Ticket revenue of active reservations created inside `[from, now]`
    fn revenue_since(&self, from: DateTime<Utc>) -> f64 {
        let events = self.events_by_id();
        round2(
            self.active_reservations()
                .filter(|r| r.created_at >= from)
                .filter_map(|r| events.get(&r.event_id).map(|e| e.price))
                .sum(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct DashboardService {
    db: DatabaseService,
    cache: CacheService,
    settings: Settings,
}

impl DashboardService {
    pub fn new(db: DatabaseService, cache: CacheService, settings: Settings) -> Self {
        Self { db, cache, settings }
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            users: self.db.users.list_all().await?,
            events: self.db.events.list(&EventFilter::default()).await?,
            reservations: self.db.reservations.list_all().await?,
            checkins: self.db.reservations.list_checkins(None).await?,
        })
    }

    pub async fn admin_stats(&self) -> Result<AdminStats> {
        let snapshot = self.snapshot().await?;
        Ok(AdminStats {
            total_events: snapshot.events.len() as i64,
            total_reservations: snapshot.active_reservations().count() as i64,
            total_checkins: snapshot.checkins.len() as i64,
            total_users: snapshot.live_users().count() as i64,
        })
    }

    /// Headline numbers, cached for `analytics.cache_ttl_seconds`
    pub async fn stats(&self) -> Result<DashboardStats> {
        let ttl = Some(self.settings.analytics.cache_ttl_seconds);
        self.cache
            .get_or_compute(DASHBOARD_STATS_KEY, ttl, || self.compute_stats())
            .await
    }

    async fn compute_stats(&self) -> Result<DashboardStats> {
        let snapshot = self.snapshot().await?;
        let now = Utc::now();
        let today = now.date_naive();
        let start_of_today = start_of_day(today);
        let start_of_month = start_of_day(today.with_day(1).unwrap_or(today));

        let active = snapshot.active_reservations().count() as i64;
        let checked_in = snapshot
            .reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::CheckedIn)
            .count() as i64;

        Ok(DashboardStats {
            total_users: snapshot.live_users().count() as i64,
            total_events: snapshot.events.len() as i64,
            total_reservations: active,
            total_checkins: snapshot.checkins.len() as i64,
            users_today: snapshot.live_users().filter(|u| is_same_day(u.created_at, today)).count() as i64,
            events_this_month: snapshot
                .events
                .iter()
                .filter(|e| e.date.year() == today.year() && e.date.month() == today.month())
                .count() as i64,
            reservations_today: snapshot
                .reservations
                .iter()
                .filter(|r| is_same_day(r.created_at, today))
                .count() as i64,
            checkins_today: snapshot
                .checkins
                .iter()
                .filter(|c| is_same_day(c.checked_in_at, today))
                .count() as i64,
            revenue_today: snapshot.revenue_since(start_of_today),
            revenue_this_month: snapshot.revenue_since(start_of_month),
            checkin_rate: percentage(checked_in, active),
            popular_events: top_events(&snapshot.events, &snapshot.active_counts(), POPULAR_EVENTS),
            recent_activity: recent_activity(&snapshot, RECENT_ACTIVITY),
        })
    }

    pub async fn quick_stats(&self) -> Result<QuickStats> {
        let snapshot = self.snapshot().await?;
        let today = Utc::now().date_naive();

        Ok(QuickStats {
            users: CountPair {
                total: snapshot.live_users().count() as i64,
                today: snapshot.live_users().filter(|u| is_same_day(u.created_at, today)).count() as i64,
            },
            events: EventCounts {
                total: snapshot.events.len() as i64,
                published: snapshot.events.iter().filter(|e| e.published).count() as i64,
            },
            reservations: CountPair {
                total: snapshot.active_reservations().count() as i64,
                today: snapshot
                    .active_reservations()
                    .filter(|r| is_same_day(r.created_at, today))
                    .count() as i64,
            },
            checkins: CountPair {
                total: snapshot.checkins.len() as i64,
                today: snapshot
                    .checkins
                    .iter()
                    .filter(|c| is_same_day(c.checked_in_at, today))
                    .count() as i64,
            },
        })
    }

    pub async fn system_status(&self) -> SystemStatus {
        let database_ok = match self.db.health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                false
            }
        };
        let cache_ok = self.cache.health_check().await;

        let mut features = BTreeMap::new();
        features.insert("analytics".to_string(), self.settings.analytics.enabled);
        features.insert("bootstrap_endpoints".to_string(), self.settings.features.bootstrap_endpoints);
        features.insert("email_notifications".to_string(), self.settings.features.email_notifications);
        features.insert("rate_limiting".to_string(), self.settings.rate_limit.enabled);
        features.insert("redis_cache".to_string(), self.settings.redis.enabled);
        features.insert("websocket_dashboard".to_string(), true);

        SystemStatus {
            status: if database_ok { "operational" } else { "degraded" }.to_string(),
            database: health_label(database_ok),
            cache: if cache_ok {
                format!("healthy ({})", self.cache.backend_name())
            } else {
                "unhealthy".to_string()
            },
            api_version: self.settings.app.version.clone(),
            environment: self.settings.app.environment.as_str().to_string(),
            timestamp: Utc::now(),
            features,
        }
    }

    /// Latest check-ins and reservations, half the limit each, newest first
    pub async fn activity_feed(&self, limit: usize) -> Result<Vec<ActivityItem>> {
        let limit = limit.clamp(1, 100);
        let per_kind = (limit / 2).max(1);
        let snapshot = self.snapshot().await?;
        let users = snapshot.users_by_id();
        let events = snapshot.events_by_id();

        let name_of = |id: Uuid| users.get(&id).map(|u| u.name.clone()).unwrap_or_default();
        let title_of = |id: Uuid| events.get(&id).map(|e| e.title.clone()).unwrap_or_default();

        let mut checkins: Vec<&Checkin> = snapshot.checkins.iter().collect();
        checkins.sort_by(|a, b| b.checked_in_at.cmp(&a.checked_in_at));
        let mut reservations: Vec<&Reservation> = snapshot.reservations.iter().collect();
        reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut feed: Vec<ActivityItem> = checkins
            .into_iter()
            .take(per_kind)
            .map(|c| {
                ActivityItem::new(
                    ActivityKind::Checkin,
                    format!("{} hizo check-in en {}", name_of(c.user_id), title_of(c.event_id)),
                    c.checked_in_at,
                )
            })
            .chain(reservations.into_iter().take(per_kind).map(|r| {
                ActivityItem::new(
                    ActivityKind::Reservation,
                    format!("{} reservó {}", name_of(r.user_id), title_of(r.event_id)),
                    r.created_at,
                )
            }))
            .collect();

        feed.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        feed.truncate(limit);
        Ok(feed)
    }

    /// Reservations and attendance of events held in each of the last six months
    pub async fn monthly_attendance(&self) -> Result<Vec<MonthlyAttendancePoint>> {
        let snapshot = self.snapshot().await?;
        let events = snapshot.events_by_id();
        let today = Utc::now().date_naive();

        let mut points: Vec<(i32, u32, MonthlyAttendancePoint)> = (0..CHART_MONTHS)
            .rev()
            .map(|back| {
                let (year, month) = months_back(today.year(), today.month(), back);
                (
                    year,
                    month,
                    MonthlyAttendancePoint {
                        month: format!("{:04}-{:02}", year, month),
                        reservations: 0,
                        attended: 0,
                    },
                )
            })
            .collect();

        for reservation in snapshot.active_reservations() {
            let Some(event) = events.get(&reservation.event_id) else {
                continue;
            };
            if let Some((_, _, point)) = points
                .iter_mut()
                .find(|(y, m, _)| *y == event.date.year() && *m == event.date.month())
            {
                point.reservations += 1;
                if reservation.status == ReservationStatus::CheckedIn {
                    point.attended += 1;
                }
            }
        }

        Ok(points.into_iter().map(|(_, _, point)| point).collect())
    }

    pub async fn category_distribution(&self) -> Result<Vec<CategoryDistribution>> {
        let snapshot = self.snapshot().await?;
        let counts = snapshot.active_counts();

        Ok(EventCategory::ALL
            .iter()
            .map(|category| {
                let in_category: Vec<&Event> = snapshot.events.iter().filter(|e| e.category == *category).collect();
                CategoryDistribution {
                    category: *category,
                    events: in_category.len() as i64,
                    reservations: in_category.iter().map(|e| counts.get(&e.id).copied().unwrap_or(0)).sum(),
                }
            })
            .collect())
    }

    /// Daily reservations and check-ins over the last seven days, today included
    pub async fn weekly_trends(&self) -> Result<Vec<WeeklyTrendPoint>> {
        let snapshot = self.snapshot().await?;
        let today = Utc::now().date_naive();

        Ok((0..TREND_DAYS)
            .rev()
            .map(|back| {
                let date = today - Duration::days(back);
                WeeklyTrendPoint {
                    date,
                    reservations: snapshot
                        .reservations
                        .iter()
                        .filter(|r| is_same_day(r.created_at, date))
                        .count() as i64,
                    checkins: snapshot
                        .checkins
                        .iter()
                        .filter(|c| is_same_day(c.checked_in_at, date))
                        .count() as i64,
                }
            })
            .collect())
    }

    /// Seat usage of the next upcoming events
    pub async fn occupancy_rates(&self) -> Result<Vec<OccupancyRate>> {
        let today = Utc::now().date_naive();
        let filter = EventFilter {
            date_from: Some(today),
            ..Default::default()
        };
        let events = self.db.events.list(&filter).await?;
        let counts = self.db.reservations.count_active_by_event().await?;

        Ok(events
            .into_iter()
            .take(OCCUPANCY_EVENTS)
            .map(|event| {
                let reserved = counts.get(&event.id).copied().unwrap_or(0);
                OccupancyRate {
                    event_id: event.id,
                    occupancy_rate: percentage(reserved, event.capacity as i64),
                    title: event.title,
                    date: event.date,
                    capacity: event.capacity,
                    reserved,
                }
            })
            .collect())
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()).unwrap_or_else(Utc::now)
}

fn health_label(ok: bool) -> String {
    if ok { "healthy" } else { "unhealthy" }.to_string()
}

/// Year and month `back` months before the given one
fn months_back(year: i32, month: u32, back: u32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 - back as i32;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

/// Registrations, reservations and new events merged newest first
fn recent_activity(snapshot: &Snapshot, limit: usize) -> Vec<ActivityItem> {
    let users = snapshot.users_by_id();
    let events = snapshot.events_by_id();

    let mut items: Vec<ActivityItem> = snapshot
        .live_users()
        .map(|u| {
            ActivityItem::new(
                ActivityKind::UserRegistration,
                format!("Nuevo usuario registrado: {}", u.name),
                u.created_at,
            )
        })
        .chain(snapshot.reservations.iter().map(|r| {
            let name = users.get(&r.user_id).map(|u| u.name.as_str()).unwrap_or_default();
            let title = events.get(&r.event_id).map(|e| e.title.as_str()).unwrap_or_default();
            ActivityItem::new(ActivityKind::Reservation, format!("{} reservó {}", name, title), r.created_at)
        }))
        .chain(snapshot.events.iter().map(|e| {
            ActivityItem::new(
                ActivityKind::EventCreated,
                format!("Nuevo evento creado: {}", e.title),
                e.created_at,
            )
        }))
        .collect();

    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    items.truncate(limit);
    items
}
