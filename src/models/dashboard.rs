//! Dashboard and chart payloads

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::{EventCategory, PopularEvent};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_events: i64,
    pub total_reservations: i64,
    pub total_checkins: i64,
    pub total_users: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    UserRegistration,
    Reservation,
    EventCreated,
    Checkin,
}

impl ActivityKind {
    pub fn icon(&self) -> &'static str {
        match self {
            ActivityKind::UserRegistration => "user-plus",
            ActivityKind::Reservation => "ticket",
            ActivityKind::EventCreated => "calendar",
            ActivityKind::Checkin => "check-circle",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityItem {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub icon: String,
}

impl ActivityItem {
    pub fn new(kind: ActivityKind, message: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            message,
            timestamp,
            icon: kind.icon().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_events: i64,
    pub total_reservations: i64,
    pub total_checkins: i64,
    pub users_today: i64,
    pub events_this_month: i64,
    pub reservations_today: i64,
    pub checkins_today: i64,
    pub revenue_today: f64,
    pub revenue_this_month: f64,
    pub checkin_rate: f64,
    pub popular_events: Vec<PopularEvent>,
    pub recent_activity: Vec<ActivityItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountPair {
    pub total: i64,
    pub today: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCounts {
    pub total: i64,
    pub published: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickStats {
    pub users: CountPair,
    pub events: EventCounts,
    pub reservations: CountPair,
    pub checkins: CountPair,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub status: String,
    pub database: String,
    pub cache: String,
    pub api_version: String,
    pub environment: String,
    pub timestamp: DateTime<Utc>,
    pub features: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityFeedQuery {
    #[serde(default = "default_feed_limit")]
    pub limit: usize,
}

fn default_feed_limit() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyAttendancePoint {
    pub month: String,
    pub reservations: i64,
    pub attended: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDistribution {
    pub category: EventCategory,
    pub events: i64,
    pub reservations: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyTrendPoint {
    pub date: NaiveDate,
    pub reservations: i64,
    pub checkins: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancyRate {
    pub event_id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    pub capacity: i32,
    pub reserved: i64,
    pub occupancy_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub cache: String,
    pub version: String,
}
