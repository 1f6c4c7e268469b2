//! Attendance reports
//!
//! Per-event attendance with demographics, the cross-event attendance summary and
//! the monthly report. Reports are served as JSON, the per-event list also as CSV.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, Utc};
use csv::Writer;
use uuid::Uuid;

use crate::database::DatabaseService;
use crate::models::{
    AttendanceEntry, AttendanceSummary, AttendanceSummaryQuery, AttendanceSummaryReport, CategoryBreakdown,
    DailyActivity, Demographics, Event, EventAttendanceReport, EventAttendanceRow, EventCategory, EventFilter,
    MonthlyReport, MonthlyReportQuery, MonthlyTotals, OverallAttendance, ReportEvent, Reservation,
    ReservationStatus, User,
};
use crate::utils::errors::{CulturalCenterError, Result};
use crate::utils::helpers::{age_group, percentage, round2, sanitize_filename};

const TOP_EVENTS: usize = 5;
const UNKNOWN_LOCATION: &str = "unknown";

/// Status counters over a set of reservations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    total: i64,
    attended: i64,
    confirmed: i64,
    cancelled: i64,
}

impl Tally {
    fn of<'a>(reservations: impl IntoIterator<Item = &'a Reservation>) -> Self {
        reservations.into_iter().fold(Self::default(), |mut tally, r| {
            tally.total += 1;
            match r.status {
                ReservationStatus::CheckedIn => tally.attended += 1,
                ReservationStatus::Confirmed => tally.confirmed += 1,
                ReservationStatus::Cancelled => tally.cancelled += 1,
                ReservationStatus::Pending => {}
            }
            tally
        })
    }

    fn active(&self) -> i64 {
        self.total - self.cancelled
    }

    fn attendance_rate(&self) -> f64 {
        percentage(self.attended, self.active())
    }
}

impl From<&Event> for ReportEvent {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            title: event.title.clone(),
            date: event.date,
            time: event.time,
            location: event.location.clone(),
            capacity: event.capacity,
            category: event.category,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportService {
    db: DatabaseService,
}

impl ReportService {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    async fn event(&self, event_id: Uuid) -> Result<Event> {
        self.db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or(CulturalCenterError::EventNotFound { event_id })
    }

    async fn users_by_id(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, User>> {
        Ok(self.db.users.find_many(ids).await?.into_iter().map(|u| (u.id, u)).collect())
    }

    pub async fn event_attendance(&self, event_id: Uuid) -> Result<EventAttendanceReport> {
        let event = self.event(event_id).await?;
        let reservations = self.db.reservations.list_for_event(event_id).await?;
        let user_ids: Vec<Uuid> = reservations.iter().map(|r| r.user_id).collect();
        let users = self.users_by_id(&user_ids).await?;

        let tally = Tally::of(&reservations);
        let mut demographics = Demographics::default();
        let mut attendance_list = Vec::with_capacity(reservations.len());

        for reservation in &reservations {
            let user = users.get(&reservation.user_id);
            if reservation.status.is_active() {
                let age = user.and_then(|u| u.age);
                *demographics.age_groups.entry(age_group(age).to_string()).or_insert(0) += 1;
                let location = user
                    .and_then(|u| u.location.as_deref())
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .unwrap_or(UNKNOWN_LOCATION);
                *demographics.locations.entry(location.to_string()).or_insert(0) += 1;
            }

            attendance_list.push(AttendanceEntry {
                user_name: user.map(|u| u.name.clone()).unwrap_or_default(),
                user_email: user.map(|u| u.email.clone()).unwrap_or_default(),
                user_phone: user.and_then(|u| u.phone.clone()),
                user_age: user.and_then(|u| u.age),
                user_location: user.and_then(|u| u.location.clone()),
                checkin_code: reservation.checkin_code.clone(),
                status: reservation.status,
                reserved_at: reservation.created_at,
                checked_in_at: reservation.checked_in_at,
                attended: reservation.status == ReservationStatus::CheckedIn,
            });
        }

        Ok(EventAttendanceReport {
            event: ReportEvent::from(&event),
            summary: AttendanceSummary {
                total_reservations: tally.total,
                total_attended: tally.attended,
                total_confirmed: tally.confirmed,
                total_cancelled: tally.cancelled,
                attendance_rate: tally.attendance_rate(),
            },
            demographics,
            attendance_list,
        })
    }

    /// Attendance list as CSV, returned with a download filename
    pub async fn event_attendance_csv(&self, event_id: Uuid) -> Result<(String, String)> {
        let report = self.event_attendance(event_id).await?;

        let mut writer = Writer::from_writer(Vec::new());
        writer.write_record([
            "name",
            "email",
            "phone",
            "age",
            "location",
            "checkin_code",
            "status",
            "reserved_at",
            "checked_in_at",
            "attended",
        ])?;
        for entry in &report.attendance_list {
            writer.write_record([
                entry.user_name.clone(),
                entry.user_email.clone(),
                entry.user_phone.clone().unwrap_or_default(),
                entry.user_age.map(|a| a.to_string()).unwrap_or_default(),
                entry.user_location.clone().unwrap_or_default(),
                entry.checkin_code.clone(),
                entry.status.as_str().to_string(),
                entry.reserved_at.to_rfc3339(),
                entry.checked_in_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                if entry.attended { "yes" } else { "no" }.to_string(),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| CulturalCenterError::Internal(format!("CSV export failed: {}", e)))?;
        let body = String::from_utf8(bytes)
            .map_err(|e| CulturalCenterError::Internal(format!("CSV export failed: {}", e)))?;

        let filename = sanitize_filename(&format!(
            "attendance_{}_{}.csv",
            report.event.title.to_lowercase(),
            report.event.date.format("%Y%m%d")
        ));
        Ok((filename, body))
    }

    pub async fn attendance_summary(&self, query: AttendanceSummaryQuery) -> Result<AttendanceSummaryReport> {
        if let (Some(from), Some(to)) = (query.date_from, query.date_to) {
            if from > to {
                return Err(CulturalCenterError::Validation(
                    "date_from cannot be after date_to".to_string(),
                ));
            }
        }
        let category = match query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(label) => Some(label.parse::<EventCategory>()?),
            None => None,
        };

        let filter = EventFilter {
            category,
            date_from: query.date_from,
            date_to: query.date_to,
            ..Default::default()
        };
        let events = self.db.events.list(&filter).await?;
        let grouped = self.reservations_by_event().await?;

        let rows: Vec<EventAttendanceRow> = events.iter().map(|e| attendance_row(e, &grouped)).collect();

        let total_reservations: i64 = rows.iter().map(|r| r.total_reservations).sum();
        let total_attended: i64 = rows.iter().map(|r| r.total_attended).sum();
        let total_capacity: i64 = events.iter().map(|e| e.capacity as i64).sum();
        let active: i64 = events
            .iter()
            .map(|e| Tally::of(grouped.get(&e.id).into_iter().flatten()).active())
            .sum();

        Ok(AttendanceSummaryReport {
            summary: OverallAttendance {
                total_events: rows.len() as i64,
                total_reservations,
                total_attended,
                overall_attendance_rate: percentage(total_attended, active),
                overall_capacity_utilization: percentage(active, total_capacity),
            },
            events: rows,
        })
    }

    async fn reservations_by_event(&self) -> Result<HashMap<Uuid, Vec<Reservation>>> {
        let mut grouped: HashMap<Uuid, Vec<Reservation>> = HashMap::new();
        for reservation in self.db.reservations.list_all().await? {
            grouped.entry(reservation.event_id).or_default().push(reservation);
        }
        Ok(grouped)
    }

    pub async fn monthly(&self, query: MonthlyReportQuery) -> Result<MonthlyReport> {
        let (first, last) = month_bounds(query.year, query.month)?;

        let filter = EventFilter {
            date_from: Some(first),
            date_to: Some(last),
            ..Default::default()
        };
        let events = self.db.events.list(&filter).await?;
        let grouped = self.reservations_by_event().await?;

        let mut by_category: BTreeMap<EventCategory, CategoryBreakdown> = BTreeMap::new();
        let mut totals = Tally::default();
        let mut revenue = 0.0;
        let mut capacity = 0i64;

        for event in &events {
            let tally = Tally::of(grouped.get(&event.id).into_iter().flatten());
            let event_revenue = event.price * tally.active() as f64;

            totals.total += tally.total;
            totals.attended += tally.attended;
            totals.confirmed += tally.confirmed;
            totals.cancelled += tally.cancelled;
            revenue += event_revenue;
            capacity += event.capacity as i64;

            let entry = by_category.entry(event.category).or_insert_with(|| CategoryBreakdown {
                category: event.category,
                events: 0,
                reservations: 0,
                attended: 0,
                revenue: 0.0,
            });
            entry.events += 1;
            entry.reservations += tally.active();
            entry.attended += tally.attended;
            entry.revenue = round2(entry.revenue + event_revenue);
        }

        let mut top_events: Vec<EventAttendanceRow> = events.iter().map(|e| attendance_row(e, &grouped)).collect();
        top_events.sort_by(|a, b| {
            b.total_reservations
                .cmp(&a.total_reservations)
                .then(a.event_date.cmp(&b.event_date))
        });
        top_events.truncate(TOP_EVENTS);

        let in_month = |date: NaiveDate| date >= first && date <= last;
        let new_users = self
            .db
            .users
            .list_all()
            .await?
            .iter()
            .filter(|u| in_month(u.created_at.date_naive()))
            .count() as i64;

        let mut daily: BTreeMap<NaiveDate, DailyActivity> = first
            .iter_days()
            .take_while(|d| *d <= last)
            .map(|date| {
                (
                    date,
                    DailyActivity {
                        date,
                        reservations: 0,
                        checkins: 0,
                    },
                )
            })
            .collect();
        for reservation in grouped.values().flatten() {
            if let Some(day) = daily.get_mut(&reservation.created_at.date_naive()) {
                day.reservations += 1;
            }
        }
        for checkin in self.db.reservations.list_checkins(None).await? {
            if let Some(day) = daily.get_mut(&checkin.checked_in_at.date_naive()) {
                day.checkins += 1;
            }
        }

        Ok(MonthlyReport {
            period: format!("{:04}-{:02}", query.year, query.month),
            totals: MonthlyTotals {
                events: events.len() as i64,
                reservations: totals.total,
                attended: totals.attended,
                cancelled: totals.cancelled,
                new_users,
                revenue: round2(revenue),
                attendance_rate: totals.attendance_rate(),
                capacity_utilization: percentage(totals.active(), capacity),
            },
            by_category: by_category.into_values().collect(),
            top_events,
            daily: daily.into_values().collect(),
            generated_at: Utc::now(),
        })
    }
}

fn attendance_row(event: &Event, grouped: &HashMap<Uuid, Vec<Reservation>>) -> EventAttendanceRow {
    let tally = Tally::of(grouped.get(&event.id).into_iter().flatten());
    EventAttendanceRow {
        event_id: event.id,
        event_title: event.title.clone(),
        event_category: event.category,
        event_date: event.date,
        capacity: event.capacity,
        total_reservations: tally.active(),
        total_attended: tally.attended,
        attendance_rate: tally.attendance_rate(),
        capacity_utilization: percentage(tally.active(), event.capacity as i64),
    }
}

/// First and last day of a calendar month
fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let invalid = || CulturalCenterError::Validation("month must be between 1 and 12 and year must be valid".to_string());
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    let last = next.pred_opt().ok_or_else(invalid)?;
    Ok((first, last))
}
