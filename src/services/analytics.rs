//! Analytics service
//!
//! Client event tracking, the live metrics snapshot pushed to dashboard sockets
//! and k-means customer segmentation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AnalyticsConfig;
use crate::database::DatabaseService;
use crate::models::{
    EventFilter, LiveMetrics, NewAnalyticsEvent, ReservationStatus, Segment, SegmentationResult,
    TrackEventResponse, PAGE_VIEW,
};
use crate::services::cache::{CacheService, SEGMENTS_KEY};
use crate::services::live::RequestMetrics;
use crate::utils::errors::{CulturalCenterError, Result};
use crate::utils::helpers::round2;

const MAX_EVENT_TYPE_LENGTH: usize = 64;
const SEGMENTS_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;
const KMEANS_SEED: u64 = 42;
const KMEANS_MAX_ITERATIONS: usize = 100;

pub const FEATURE_NAMES: [&str; 5] = [
    "age",
    "total_reservations",
    "attendance_rate",
    "cancellation_rate",
    "distinct_categories",
];

const RESERVATIONS: usize = 1;
const ATTENDANCE: usize = 2;
const CANCELLATION: usize = 3;

pub const LABEL_FREQUENT: &str = "Asistentes frecuentes";
pub const LABEL_AT_RISK: &str = "En riesgo";
pub const LABEL_EXPLORERS: &str = "Exploradores";
pub const LABEL_OCCASIONAL: &str = "Ocasionales";

type Features = [f64; 5];

fn event_type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9_]+$").expect("event type pattern compiles"))
}

/// Whether a client-supplied event type is acceptable
pub fn is_valid_event_type(event_type: &str) -> bool {
    event_type.len() <= MAX_EVENT_TYPE_LENGTH && event_type_pattern().is_match(event_type)
}

#[derive(Debug, Clone)]
pub struct AnalyticsService {
    db: DatabaseService,
    cache: CacheService,
    config: AnalyticsConfig,
}

impl AnalyticsService {
    pub fn new(db: DatabaseService, cache: CacheService, config: AnalyticsConfig) -> Self {
        Self { db, cache, config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub async fn track(
        &self,
        event_type: &str,
        user_id: Option<Uuid>,
        metadata: serde_json::Value,
    ) -> Result<TrackEventResponse> {
        if !self.config.enabled {
            return Ok(TrackEventResponse {
                status: "disabled".to_string(),
            });
        }

        let event_type = event_type.trim();
        if !is_valid_event_type(event_type) {
            return Err(CulturalCenterError::Validation(format!(
                "event_type must be at most {} characters of lowercase letters, digits and underscores",
                MAX_EVENT_TYPE_LENGTH
            )));
        }

        self.db
            .analytics
            .record(NewAnalyticsEvent {
                event_type: event_type.to_string(),
                user_id,
                metadata,
            })
            .await?;
        debug!(event_type = %event_type, user_id = ?user_id, "Analytics event tracked");

        Ok(TrackEventResponse {
            status: "tracked".to_string(),
        })
    }

    /// Snapshot pushed to dashboard sockets
    pub async fn live_metrics(&self, requests: &RequestMetrics) -> Result<LiveMetrics> {
        let now = Utc::now();
        let hour_ago = now - Duration::hours(1);
        let window_start = now - Duration::minutes(self.config.active_window_minutes);

        let recent = self.db.analytics.list_since(window_start.min(hour_ago), None).await?;
        let active_users = recent
            .iter()
            .filter(|e| e.created_at >= window_start)
            .filter_map(|e| e.user_id)
            .collect::<HashSet<_>>()
            .len() as i64;
        let page_view_hourly = recent
            .iter()
            .filter(|e| e.created_at >= hour_ago && e.event_type == PAGE_VIEW)
            .count() as i64;

        let event_booking_hourly = self
            .db
            .reservations
            .list_all()
            .await?
            .iter()
            .filter(|r| r.created_at >= hour_ago)
            .count() as i64;
        let event_checkin_hourly = self.db.reservations.list_checkins(Some(hour_ago)).await?.len() as i64;

        Ok(LiveMetrics {
            active_users,
            event_booking_hourly,
            page_view_hourly,
            event_checkin_hourly,
            performance: requests.snapshot(),
            timestamp: now,
        })
    }

    /// Cluster non-admin accounts on their booking behaviour and cache the result
    pub async fn train_segmentation(&self) -> Result<SegmentationResult> {
        let users: Vec<_> = self
            .db
            .users
            .list_all()
            .await?
            .into_iter()
            .filter(|u| !u.is_deleted() && !u.is_admin)
            .collect();
        if users.is_empty() {
            return Err(CulturalCenterError::InvalidInput(
                "No users available for segmentation".to_string(),
            ));
        }

        let categories: HashMap<Uuid, _> = self
            .db
            .events
            .list(&EventFilter::default())
            .await?
            .into_iter()
            .map(|e| (e.id, e.category))
            .collect();
        let mut by_user: HashMap<Uuid, Vec<_>> = HashMap::new();
        for reservation in self.db.reservations.list_all().await? {
            by_user.entry(reservation.user_id).or_default().push(reservation);
        }

        let known_ages: Vec<f64> = users.iter().filter_map(|u| u.age).map(f64::from).collect();
        let mean_age = if known_ages.is_empty() {
            0.0
        } else {
            known_ages.iter().sum::<f64>() / known_ages.len() as f64
        };

        let raw: Vec<Features> = users
            .iter()
            .map(|user| {
                let reservations = by_user.get(&user.id).map(Vec::as_slice).unwrap_or_default();
                let total = reservations.len() as f64;
                let cancelled = reservations
                    .iter()
                    .filter(|r| r.status == ReservationStatus::Cancelled)
                    .count() as f64;
                let attended = reservations
                    .iter()
                    .filter(|r| r.status == ReservationStatus::CheckedIn)
                    .count() as f64;
                let active = total - cancelled;
                let distinct = reservations
                    .iter()
                    .filter_map(|r| categories.get(&r.event_id))
                    .collect::<HashSet<_>>()
                    .len() as f64;

                [
                    user.age.map(f64::from).unwrap_or(mean_age),
                    total,
                    if active > 0.0 { attended / active } else { 0.0 },
                    if total > 0.0 { cancelled / total } else { 0.0 },
                    distinct,
                ]
            })
            .collect();

        let k = self.config.segmentation_clusters.clamp(1, raw.len());
        let scaled = min_max_scale(&raw);
        let assignments = kmeans(&scaled, k, KMEANS_SEED);

        let mut segments: Vec<Segment> = (0..k)
            .filter_map(|cluster| {
                let members: Vec<usize> = (0..raw.len()).filter(|i| assignments[*i] == cluster).collect();
                if members.is_empty() {
                    return None;
                }
                let size = members.len() as f64;
                let mean = |feature: usize| members.iter().map(|i| raw[*i][feature]).sum::<f64>() / size;

                let ages: Vec<f64> = members.iter().filter_map(|i| users[*i].age).map(f64::from).collect();
                let avg_age = (!ages.is_empty()).then(|| round2(ages.iter().sum::<f64>() / ages.len() as f64));

                Some(Segment {
                    id: cluster,
                    label: String::new(),
                    size: members.len(),
                    centroid: FEATURE_NAMES
                        .iter()
                        .enumerate()
                        .map(|(f, name)| (name.to_string(), round2(mean(f))))
                        .collect::<BTreeMap<_, _>>(),
                    avg_age,
                    avg_reservations: round2(mean(RESERVATIONS)),
                    avg_attendance_rate: round2(mean(ATTENDANCE) * 100.0),
                })
            })
            .collect();
        label_segments(&mut segments);

        let result = SegmentationResult {
            num_users: raw.len(),
            num_features: FEATURE_NAMES.len(),
            num_clusters: segments.len(),
            segments,
            trained_at: Utc::now(),
        };
        self.cache.set(SEGMENTS_KEY, &result, Some(SEGMENTS_TTL_SECONDS)).await?;

        info!(
            users = result.num_users,
            clusters = result.num_clusters,
            "Customer segmentation trained"
        );
        Ok(result)
    }

    pub async fn segments(&self) -> Result<SegmentationResult> {
        self.cache
            .get::<SegmentationResult>(SEGMENTS_KEY)
            .await?
            .ok_or_else(|| CulturalCenterError::NotFound("Segmentation has not been trained yet".to_string()))
    }
}

/// Scale every column to [0, 1]; constant columns become 0
fn min_max_scale(rows: &[Features]) -> Vec<Features> {
    let mut min = [f64::INFINITY; 5];
    let mut max = [f64::NEG_INFINITY; 5];
    for row in rows {
        for f in 0..5 {
            min[f] = min[f].min(row[f]);
            max[f] = max[f].max(row[f]);
        }
    }

    rows.iter()
        .map(|row| {
            let mut scaled = [0.0; 5];
            for f in 0..5 {
                let range = max[f] - min[f];
                scaled[f] = if range > f64::EPSILON { (row[f] - min[f]) / range } else { 0.0 };
            }
            scaled
        })
        .collect()
}

fn distance(a: &Features, b: &Features) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(point: &Features, centroids: &[Features]) -> usize {
    centroids
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| distance(point, a).total_cmp(&distance(point, b)))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Lloyd's algorithm with k-means++ seeding from a fixed seed; returns the cluster of each point
fn kmeans(points: &[Features], k: usize, seed: u64) -> Vec<usize> {
    if points.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids: Vec<Features> = vec![points[rng.gen_range(0..points.len())]];
    while centroids.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| centroids.iter().map(|c| distance(p, c)).fold(f64::INFINITY, f64::min))
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= f64::EPSILON {
            // Remaining points coincide with existing centroids
            centroids.push(points[centroids.len() % points.len()]);
            continue;
        }
        let mut target = rng.gen::<f64>() * total;
        let mut chosen = points.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            if target < *w {
                chosen = i;
                break;
            }
            target -= w;
        }
        centroids.push(points[chosen]);
    }

    let mut assignments = vec![usize::MAX; points.len()];
    for _ in 0..KMEANS_MAX_ITERATIONS {
        let next: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();
        if next == assignments {
            break;
        }
        assignments = next;

        for (cluster, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Features> = points
                .iter()
                .zip(&assignments)
                .filter(|(_, a)| **a == cluster)
                .map(|(p, _)| p)
                .collect();
            if members.is_empty() {
                continue;
            }
            for f in 0..5 {
                centroid[f] = members.iter().map(|m| m[f]).sum::<f64>() / members.len() as f64;
            }
        }
    }
    assignments
}

/// Name clusters: best attendance, then highest cancellation, then fewest reservations
fn label_segments(segments: &mut [Segment]) {
    let feature = |s: &Segment, name: &str| s.centroid.get(name).copied().unwrap_or(0.0);
    let mut unlabeled: Vec<usize> = (0..segments.len()).collect();

    let mut take = |segments: &mut [Segment], label: &str, key: &dyn Fn(&Segment) -> f64, highest: bool| {
        let pick = unlabeled
            .iter()
            .copied()
            .max_by(|a, b| {
                let ordering = key(&segments[*a]).total_cmp(&key(&segments[*b]));
                if highest {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        if let Some(index) = pick {
            segments[index].label = label.to_string();
            unlabeled.retain(|i| *i != index);
        }
    };

    take(segments, LABEL_FREQUENT, &|s| feature(s, FEATURE_NAMES[ATTENDANCE]), true);
    take(segments, LABEL_AT_RISK, &|s| feature(s, FEATURE_NAMES[CANCELLATION]), true);
    take(segments, LABEL_EXPLORERS, &|s| feature(s, FEATURE_NAMES[RESERVATIONS]), false);

    for segment in segments.iter_mut().filter(|s| s.label.is_empty()) {
        segment.label = LABEL_OCCASIONAL.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_validation() {
        assert!(is_valid_event_type("page_view"));
        assert!(is_valid_event_type("event_booking_2"));
        assert!(!is_valid_event_type("Page View"));
        assert!(!is_valid_event_type(""));
        assert!(!is_valid_event_type(&"a".repeat(65)));
    }

    #[test]
    fn test_min_max_scale_handles_constant_columns() {
        let rows = vec![[20.0, 0.0, 1.0, 0.0, 2.0], [40.0, 10.0, 1.0, 0.5, 2.0]];
        let scaled = min_max_scale(&rows);
        assert_eq!(scaled[0], [0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(scaled[1], [1.0, 1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_kmeans_separates_obvious_groups_deterministically() {
        let points = vec![
            [0.0, 0.0, 0.0, 0.0, 0.0],
            [0.05, 0.0, 0.0, 0.0, 0.0],
            [1.0, 1.0, 1.0, 1.0, 1.0],
            [0.95, 1.0, 1.0, 1.0, 1.0],
        ];
        let first = kmeans(&points, 2, KMEANS_SEED);
        let second = kmeans(&points, 2, KMEANS_SEED);
        assert_eq!(first, second);
        assert_eq!(first[0], first[1]);
        assert_eq!(first[2], first[3]);
        assert_ne!(first[0], first[2]);
    }
}
