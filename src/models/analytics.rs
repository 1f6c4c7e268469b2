//! Analytics models: tracked client events, live metrics and customer segments

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const PAGE_VIEW: &str = "page_view";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalyticsEvent {
    pub id: Uuid,
    pub event_type: String,
    pub user_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAnalyticsEvent {
    pub event_type: String,
    pub user_id: Option<Uuid>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackEventQuery {
    pub event_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackEventResponse {
    pub status: String,
}

/// Snapshot pushed to dashboard sockets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveMetrics {
    pub active_users: i64,
    pub event_booking_hourly: i64,
    pub page_view_hourly: i64,
    pub event_checkin_hourly: i64,
    pub performance: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

/// Envelope of every dashboard socket message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: LiveMetrics,
}

impl DashboardMessage {
    pub fn initial(data: LiveMetrics) -> Self {
        Self {
            kind: "initial_metrics".to_string(),
            data,
        }
    }

    pub fn update(data: LiveMetrics) -> Self {
        Self {
            kind: "metrics_update".to_string(),
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: usize,
    pub label: String,
    pub size: usize,
    pub centroid: BTreeMap<String, f64>,
    pub avg_age: Option<f64>,
    pub avg_reservations: f64,
    pub avg_attendance_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationResult {
    pub num_users: usize,
    pub num_features: usize,
    pub num_clusters: usize,
    pub segments: Vec<Segment>,
    pub trained_at: DateTime<Utc>,
}
