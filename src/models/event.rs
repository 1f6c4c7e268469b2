//! Event model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The eight programme lines of the cultural center
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_category")]
pub enum EventCategory {
    #[serde(rename = "Dominican Cinema")]
    #[sqlx(rename = "Dominican Cinema")]
    DominicanCinema,
    #[serde(rename = "Classic Cinema")]
    #[sqlx(rename = "Classic Cinema")]
    ClassicCinema,
    #[serde(rename = "General Cinema")]
    #[sqlx(rename = "General Cinema")]
    GeneralCinema,
    #[serde(rename = "Workshops")]
    #[sqlx(rename = "Workshops")]
    Workshops,
    #[serde(rename = "Concerts")]
    #[sqlx(rename = "Concerts")]
    Concerts,
    #[serde(rename = "Talks/Conferences")]
    #[sqlx(rename = "Talks/Conferences")]
    TalksConferences,
    #[serde(rename = "Art Exhibitions")]
    #[sqlx(rename = "Art Exhibitions")]
    ArtExhibitions,
    #[serde(rename = "3D Immersive Experiences")]
    #[sqlx(rename = "3D Immersive Experiences")]
    ImmersiveExperiences,
}

impl EventCategory {
    pub const ALL: [EventCategory; 8] = [
        EventCategory::DominicanCinema,
        EventCategory::ClassicCinema,
        EventCategory::GeneralCinema,
        EventCategory::Workshops,
        EventCategory::Concerts,
        EventCategory::TalksConferences,
        EventCategory::ArtExhibitions,
        EventCategory::ImmersiveExperiences,
    ];

    /// Canonical (English) label, as stored and returned by the API
    pub fn label(&self) -> &'static str {
        match self {
            EventCategory::DominicanCinema => "Dominican Cinema",
            EventCategory::ClassicCinema => "Classic Cinema",
            EventCategory::GeneralCinema => "General Cinema",
            EventCategory::Workshops => "Workshops",
            EventCategory::Concerts => "Concerts",
            EventCategory::TalksConferences => "Talks/Conferences",
            EventCategory::ArtExhibitions => "Art Exhibitions",
            EventCategory::ImmersiveExperiences => "3D Immersive Experiences",
        }
    }

    /// Label used by the Spanish-language clients
    pub fn spanish_label(&self) -> &'static str {
        match self {
            EventCategory::DominicanCinema => "Cinema Dominicano",
            EventCategory::ClassicCinema => "Cine Clásico",
            EventCategory::GeneralCinema => "Cine General",
            EventCategory::Workshops => "Talleres",
            EventCategory::Concerts => "Conciertos",
            EventCategory::TalksConferences => "Charlas/Conferencias",
            EventCategory::ArtExhibitions => "Exposiciones de Arte",
            EventCategory::ImmersiveExperiences => "Experiencias 3D Inmersivas",
        }
    }

    /// Accept either label, ignoring case and surrounding whitespace
    pub fn parse_label(text: &str) -> Option<Self> {
        let wanted = text.trim().to_lowercase();
        Self::ALL.into_iter().find(|category| {
            category.label().to_lowercase() == wanted || category.spanish_label().to_lowercase() == wanted
        })
    }

    pub fn valid_labels() -> String {
        Self::ALL.iter().map(|c| c.label()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EventCategory {
    type Err = crate::utils::CulturalCenterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_label(s).ok_or_else(|| {
            crate::utils::CulturalCenterError::InvalidInput(format!(
                "Invalid category '{}'. Valid categories: {}",
                s.trim(),
                Self::valid_labels()
            ))
        })
    }
}

/// `HH:MM` serialization for times of day
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&crate::utils::helpers::format_hhmm(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        crate::utils::helpers::parse_hhmm(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time '{}', expected HH:MM", text)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub capacity: i32,
    pub location: String,
    pub image_url: Option<String>,
    pub price: f64,
    pub tags: Vec<String>,
    pub requirements: Option<String>,
    pub contact_info: Option<String>,
    pub published: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Free seats given the number of active reservations
    pub fn available_spots(&self, active_reservations: i64) -> i64 {
        (self.capacity as i64 - active_reservations).max(0)
    }
}

/// Event as returned by the API, with live availability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub available_spots: i64,
    pub reserved_count: i64,
}

impl EventView {
    pub fn new(event: Event, active_reservations: i64) -> Self {
        Self {
            available_spots: event.available_spots(active_reservations),
            reserved_count: active_reservations,
            event,
        }
    }
}

/// Compact event reference embedded in other payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBrief {
    pub id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub location: String,
    pub category: EventCategory,
}

impl From<&Event> for EventBrief {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            title: event.title.clone(),
            date: event.date,
            time: event.time,
            location: event.location.clone(),
            category: event.category,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub date: NaiveDate,
    pub time: String,
    pub capacity: i32,
    pub location: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub requirements: Option<String>,
    pub contact_info: Option<String>,
    pub published: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub capacity: Option<i32>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub requirements: Option<String>,
    pub contact_info: Option<String>,
    pub published: Option<bool>,
}

/// Validated row to insert
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub capacity: i32,
    pub location: String,
    pub image_url: Option<String>,
    pub price: f64,
    pub tags: Vec<String>,
    pub requirements: Option<String>,
    pub contact_info: Option<String>,
    pub published: bool,
    pub created_by: Option<Uuid>,
}

/// Validated column changes; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<EventCategory>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub capacity: Option<i32>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub requirements: Option<String>,
    pub contact_info: Option<String>,
    pub published: Option<bool>,
}

/// Result of an update guarded by the reservation count
#[derive(Debug, Clone)]
pub enum EventUpdateOutcome {
    Updated(Event),
    NotFound,
    CapacityBelowReservations { active: i64 },
}

/// Repository-level event filter
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub category: Option<EventCategory>,
    pub published_only: bool,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        if self.published_only && !event.published {
            return false;
        }
        if self.category.is_some_and(|c| c != event.category) {
            return false;
        }
        if self.date_from.is_some_and(|from| event.date < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| event.date > to) {
            return false;
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            if !event.title.to_lowercase().contains(&needle)
                && !event.description.to_lowercase().contains(&needle)
                && !event.location.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

/// Query string of the public event list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventListQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub include_unpublished: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryOption {
    pub value: EventCategory,
    pub label_es: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryListResponse {
    pub categories: Vec<CategoryOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularEvent {
    pub id: Uuid,
    pub title: String,
    pub reservations: i64,
    pub capacity: i32,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStatsOverview {
    pub total_events: i64,
    pub published_events: i64,
    pub draft_events: i64,
    pub by_category: std::collections::BTreeMap<String, i64>,
    pub this_month: i64,
    pub total_reservations: i64,
    pub total_revenue: f64,
    pub popular_events: Vec<PopularEvent>,
}

/// One selectable start time of the scheduling grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub time: String,
    pub occupied: bool,
    pub nearby: Vec<EventBrief>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub events: Vec<EventBrief>,
    pub slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotCheck {
    pub date: NaiveDate,
    pub time: String,
    pub occupied: bool,
    pub occupied_by: Vec<EventBrief>,
    pub nearby: Vec<EventBrief>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotCheckQuery {
    pub date: NaiveDate,
    pub time: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_accepts_spanish_and_english() {
        assert_eq!(EventCategory::parse_label("Conciertos"), Some(EventCategory::Concerts));
        assert_eq!(EventCategory::parse_label(" concerts "), Some(EventCategory::Concerts));
        assert_eq!(
            EventCategory::parse_label("Experiencias 3D Inmersivas"),
            Some(EventCategory::ImmersiveExperiences)
        );
        assert!(EventCategory::parse_label("Opera").is_none());
    }

    #[test]
    fn test_category_serializes_to_english_label() {
        let json = serde_json::to_string(&EventCategory::TalksConferences).unwrap();
        assert_eq!(json, "\"Talks/Conferences\"");
    }

    #[test]
    fn test_invalid_category_error_mentions_category() {
        let err = "Opera".parse::<EventCategory>().unwrap_err();
        assert!(err.to_string().contains("category"));
    }
}
