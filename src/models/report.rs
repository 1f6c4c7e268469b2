//! Attendance report shapes

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::{hhmm, EventCategory};
use super::reservation::ReservationStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEvent {
    pub id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub location: String,
    pub capacity: i32,
    pub category: EventCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub total_reservations: i64,
    pub total_attended: i64,
    pub total_confirmed: i64,
    pub total_cancelled: i64,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Demographics {
    pub age_groups: BTreeMap<String, i64>,
    pub locations: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub user_name: String,
    pub user_email: String,
    pub user_phone: Option<String>,
    pub user_age: Option<i32>,
    pub user_location: Option<String>,
    pub checkin_code: String,
    pub status: ReservationStatus,
    pub reserved_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub attended: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAttendanceReport {
    pub event: ReportEvent,
    pub summary: AttendanceSummary,
    pub demographics: Demographics,
    pub attendance_list: Vec<AttendanceEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceSummaryQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAttendanceRow {
    pub event_id: Uuid,
    pub event_title: String,
    pub event_category: EventCategory,
    pub event_date: NaiveDate,
    pub capacity: i32,
    pub total_reservations: i64,
    pub total_attended: i64,
    pub attendance_rate: f64,
    pub capacity_utilization: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallAttendance {
    pub total_events: i64,
    pub total_reservations: i64,
    pub total_attended: i64,
    pub overall_attendance_rate: f64,
    pub overall_capacity_utilization: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceSummaryReport {
    pub summary: OverallAttendance,
    pub events: Vec<EventAttendanceRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonthlyReportQuery {
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: EventCategory,
    pub events: i64,
    pub reservations: i64,
    pub attended: i64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub reservations: i64,
    pub checkins: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyTotals {
    pub events: i64,
    pub reservations: i64,
    pub attended: i64,
    pub cancelled: i64,
    pub new_users: i64,
    pub revenue: f64,
    pub attendance_rate: f64,
    pub capacity_utilization: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub period: String,
    pub totals: MonthlyTotals,
    pub by_category: Vec<CategoryBreakdown>,
    pub top_events: Vec<EventAttendanceRow>,
    pub daily: Vec<DailyActivity>,
    pub generated_at: DateTime<Utc>,
}
