//! Event service implementation
//!
//! Event CRUD with live availability, the category catalogue, the scheduling
//! heuristic used by the event editor and the admin overview numbers.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::database::DatabaseService;
use crate::models::{
    CategoryListResponse, CategoryOption, CreateEventRequest, DaySchedule, Event, EventBrief, EventCategory,
    EventChanges, EventFilter, EventListQuery, EventReservationRow, EventStatsOverview, EventUpdateOutcome,
    EventView, NewEvent, PageParams, Paginated, PopularEvent, SlotCheck, TimeSlot, UpdateEventRequest,
};
use crate::services::cache::{CacheService, DASHBOARD_STATS_KEY};
use crate::utils::errors::{CulturalCenterError, Result};
use crate::utils::helpers::{format_hhmm, minutes_apart, parse_hhmm, round2};
use crate::utils::logging::log_event_action;

/// First and last hour offered by the scheduling grid
pub const SCHEDULE_FIRST_HOUR: u32 = 9;
pub const SCHEDULE_LAST_HOUR: u32 = 21;
/// Events closer than this (but not at the same minute) are reported as nearby
pub const NEARBY_WINDOW_MINUTES: i64 = 120;

#[derive(Debug, Clone)]
pub struct EventService {
    db: DatabaseService,
    cache: CacheService,
}

impl EventService {
    pub fn new(db: DatabaseService, cache: CacheService) -> Self {
        Self { db, cache }
    }

    async fn view(&self, event: Event) -> Result<EventView> {
        let active = self.db.reservations.count_active_for_event(event.id).await?;
        Ok(EventView::new(event, active))
    }

    async fn views(&self, events: Vec<Event>) -> Result<Vec<EventView>> {
        let counts = self.db.reservations.count_active_by_event().await?;
        Ok(events
            .into_iter()
            .map(|event| {
                let active = counts.get(&event.id).copied().unwrap_or(0);
                EventView::new(event, active)
            })
            .collect())
    }

    /// Public listing; unpublished events only reach admins who ask for them
    pub async fn list_events(&self, query: EventListQuery, is_admin: bool) -> Result<Vec<EventView>> {
        let category = match query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(label) => Some(label.parse::<EventCategory>()?),
            None => None,
        };

        let filter = EventFilter {
            category,
            published_only: !(is_admin && query.include_unpublished),
            date_from: query.date_from,
            date_to: query.date_to,
            search: query.search,
        };

        let events = self.db.events.list(&filter).await?;
        self.views(events).await
    }

    /// Fetch an event the caller may see
    pub async fn get_event(&self, event_id: Uuid, is_admin: bool) -> Result<EventView> {
        let event = self.find_visible(event_id, is_admin).await?;
        self.view(event).await
    }

    pub async fn find_visible(&self, event_id: Uuid, is_admin: bool) -> Result<Event> {
        match self.db.events.find_by_id(event_id).await? {
            Some(event) if event.published || is_admin => Ok(event),
            _ => Err(CulturalCenterError::EventNotFound { event_id }),
        }
    }

    pub async fn create_event(&self, request: CreateEventRequest, admin_id: Uuid) -> Result<EventView> {
        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(CulturalCenterError::Validation("Title is required".to_string()));
        }
        validate_capacity(request.capacity)?;
        validate_price(request.price)?;
        let location = request.location.trim().to_string();
        if location.is_empty() {
            return Err(CulturalCenterError::Validation("Location is required".to_string()));
        }

        let new_event = NewEvent {
            title,
            description: request.description.trim().to_string(),
            category: request.category.parse()?,
            date: request.date,
            time: parse_time(&request.time)?,
            capacity: request.capacity,
            location,
            image_url: non_empty(request.image_url),
            price: request.price,
            tags: clean_tags(request.tags),
            requirements: non_empty(request.requirements),
            contact_info: non_empty(request.contact_info),
            published: request.published.unwrap_or(true),
            created_by: Some(admin_id),
        };

        let event = self.db.events.create(new_event).await?;
        log_event_action(event.id, "created", admin_id, Some(&event.title));
        self.cache.invalidate(DASHBOARD_STATS_KEY).await;

        Ok(EventView::new(event, 0))
    }

    pub async fn update_event(&self, event_id: Uuid, request: UpdateEventRequest, admin_id: Uuid) -> Result<EventView> {
        let title = match request.title.map(|t| t.trim().to_string()) {
            Some(t) if t.is_empty() => {
                return Err(CulturalCenterError::Validation("Title is required".to_string()));
            }
            other => other,
        };
        if let Some(capacity) = request.capacity {
            validate_capacity(capacity)?;
        }
        if let Some(price) = request.price {
            validate_price(price)?;
        }

        let changes = EventChanges {
            title,
            description: request.description.map(|d| d.trim().to_string()),
            category: request.category.as_deref().map(str::parse).transpose()?,
            date: request.date,
            time: request.time.as_deref().map(parse_time).transpose()?,
            capacity: request.capacity,
            location: request.location.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
            image_url: request.image_url,
            price: request.price,
            tags: request.tags.map(clean_tags),
            requirements: request.requirements,
            contact_info: request.contact_info,
            published: request.published,
        };

        match self.db.events.update(event_id, changes).await? {
            EventUpdateOutcome::Updated(event) => {
                log_event_action(event.id, "updated", admin_id, None);
                self.cache.invalidate(DASHBOARD_STATS_KEY).await;
                self.view(event).await
            }
            EventUpdateOutcome::NotFound => Err(CulturalCenterError::EventNotFound { event_id }),
            EventUpdateOutcome::CapacityBelowReservations { active } => Err(CulturalCenterError::InvalidInput(
                format!("Capacity cannot be lower than the {} existing reservations", active),
            )),
        }
    }

    /// Delete an event together with its reservations
    pub async fn delete_event(&self, event_id: Uuid, admin_id: Uuid) -> Result<()> {
        if !self.db.events.delete(event_id).await? {
            return Err(CulturalCenterError::EventNotFound { event_id });
        }
        log_event_action(event_id, "deleted", admin_id, None);
        self.cache.invalidate(DASHBOARD_STATS_KEY).await;
        Ok(())
    }

    /// Flip the published flag
    pub async fn toggle_publish(&self, event_id: Uuid, admin_id: Uuid) -> Result<EventView> {
        let event = self
            .db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or(CulturalCenterError::EventNotFound { event_id })?;

        let changes = EventChanges {
            published: Some(!event.published),
            ..Default::default()
        };
        match self.db.events.update(event_id, changes).await? {
            EventUpdateOutcome::Updated(event) => {
                let action = if event.published { "published" } else { "unpublished" };
                log_event_action(event.id, action, admin_id, None);
                self.cache.invalidate(DASHBOARD_STATS_KEY).await;
                self.view(event).await
            }
            _ => Err(CulturalCenterError::EventNotFound { event_id }),
        }
    }

    pub fn category_labels() -> Vec<&'static str> {
        EventCategory::ALL.iter().map(|c| c.label()).collect()
    }

    pub fn category_options() -> CategoryListResponse {
        CategoryListResponse {
            categories: EventCategory::ALL
                .iter()
                .map(|c| CategoryOption {
                    value: *c,
                    label_es: c.spanish_label().to_string(),
                })
                .collect(),
        }
    }

    pub async fn stats_overview(&self) -> Result<EventStatsOverview> {
        let events = self.db.events.list(&EventFilter::default()).await?;
        let counts = self.db.reservations.count_active_by_event().await?;
        let today = Utc::now().date_naive();

        let mut by_category: BTreeMap<String, i64> = BTreeMap::new();
        let mut total_revenue = 0.0;
        let mut this_month = 0;
        for event in &events {
            *by_category.entry(event.category.label().to_string()).or_insert(0) += 1;
            let active = counts.get(&event.id).copied().unwrap_or(0);
            total_revenue += event.price * active as f64;
            if event.date.year() == today.year() && event.date.month() == today.month() {
                this_month += 1;
            }
        }

        let published_events = events.iter().filter(|e| e.published).count() as i64;
        let popular_events = top_events(&events, &counts, 5);

        Ok(EventStatsOverview {
            total_events: events.len() as i64,
            published_events,
            draft_events: events.len() as i64 - published_events,
            by_category,
            this_month,
            total_reservations: counts.values().sum(),
            total_revenue: round2(total_revenue),
            popular_events,
        })
    }

    /// Reservations of one event with their holders, oldest first
    pub async fn event_reservations(&self, event_id: Uuid, params: PageParams) -> Result<Paginated<EventReservationRow>> {
        let params = params.validated()?;
        if self.db.events.find_by_id(event_id).await?.is_none() {
            return Err(CulturalCenterError::EventNotFound { event_id });
        }

        let reservations = self.db.reservations.list_for_event(event_id).await?;
        let total = reservations.len() as i64;
        let page = params.slice(reservations);

        let user_ids: Vec<Uuid> = page.iter().map(|r| r.user_id).collect();
        let users: HashMap<Uuid, _> = self
            .db
            .users
            .find_many(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let rows = page
            .into_iter()
            .map(|reservation| {
                let user = users.get(&reservation.user_id);
                EventReservationRow {
                    user_name: user.map(|u| u.name.clone()).unwrap_or_default(),
                    user_email: user.map(|u| u.email.clone()).unwrap_or_default(),
                    user_phone: user.and_then(|u| u.phone.clone()),
                    reservation,
                }
            })
            .collect();

        Ok(Paginated::new(rows, total, params))
    }

    async fn events_on(&self, date: NaiveDate) -> Result<Vec<Event>> {
        let filter = EventFilter {
            date_from: Some(date),
            date_to: Some(date),
            ..Default::default()
        };
        self.db.events.list(&filter).await
    }

    /// Quarter-hour grid of a day with occupied and nearby markers
    pub async fn schedule(&self, date: NaiveDate) -> Result<DaySchedule> {
        let events = self.events_on(date).await?;

        let slots = schedule_grid()
            .into_iter()
            .map(|slot| {
                let (occupied, nearby) = classify_slot(&events, slot);
                TimeSlot {
                    time: format_hhmm(slot),
                    occupied: !occupied.is_empty(),
                    nearby,
                }
            })
            .collect();

        Ok(DaySchedule {
            date,
            events: events.iter().map(EventBrief::from).collect(),
            slots,
        })
    }

    /// Warnings for a proposed start time; never blocks event creation
    pub async fn check_slot(&self, date: NaiveDate, time: &str) -> Result<SlotCheck> {
        let slot = parse_time(time)?;
        let events = self.events_on(date).await?;
        let (occupied_by, nearby) = classify_slot(&events, slot);

        Ok(SlotCheck {
            date,
            time: format_hhmm(slot),
            occupied: !occupied_by.is_empty(),
            occupied_by,
            nearby,
        })
    }

    /// Insert one sample event per category unless events already exist
    pub async fn seed_sample_events(&self, admin_id: Uuid) -> Result<usize> {
        if !self.db.events.list(&EventFilter::default()).await?.is_empty() {
            return Ok(0);
        }

        let today = Utc::now().date_naive();
        let mut created = 0;
        for (offset, sample) in sample_events().into_iter().enumerate() {
            let event = NewEvent {
                title: sample.title.to_string(),
                description: sample.description.to_string(),
                category: sample.category,
                date: today + Duration::days(7 + offset as i64),
                time: sample.time,
                capacity: sample.capacity,
                location: sample.location.to_string(),
                image_url: None,
                price: sample.price,
                tags: sample.tags.iter().map(|t| t.to_string()).collect(),
                requirements: None,
                contact_info: Some("info@culturalcenter.com".to_string()),
                published: true,
                created_by: Some(admin_id),
            };
            self.db.events.create(event).await?;
            created += 1;
        }

        info!(count = created, "Sample events created");
        self.cache.invalidate(DASHBOARD_STATS_KEY).await;
        Ok(created)
    }
}

/// Events ranked by active reservations, ties broken by date
pub fn top_events(events: &[Event], counts: &HashMap<Uuid, i64>, limit: usize) -> Vec<PopularEvent> {
    let mut ranked: Vec<PopularEvent> = events
        .iter()
        .map(|e| PopularEvent {
            id: e.id,
            title: e.title.clone(),
            reservations: counts.get(&e.id).copied().unwrap_or(0),
            capacity: e.capacity,
            date: e.date,
        })
        .collect();
    ranked.sort_by(|a, b| b.reservations.cmp(&a.reservations).then(a.date.cmp(&b.date)));
    ranked.truncate(limit);
    ranked
}

fn schedule_grid() -> Vec<NaiveTime> {
    (SCHEDULE_FIRST_HOUR..=SCHEDULE_LAST_HOUR)
        .flat_map(|hour| [0, 15, 30, 45].into_iter().filter_map(move |minute| NaiveTime::from_hms_opt(hour, minute, 0)))
        .collect()
}

/// Split the day's events into those starting exactly at `slot` and those within the nearby window
fn classify_slot(events: &[Event], slot: NaiveTime) -> (Vec<EventBrief>, Vec<EventBrief>) {
    let mut occupied = Vec::new();
    let mut nearby = Vec::new();
    for event in events {
        let delta = minutes_apart(event.time, slot);
        if delta == 0 {
            occupied.push(EventBrief::from(event));
        } else if delta <= NEARBY_WINDOW_MINUTES {
            nearby.push(EventBrief::from(event));
        }
    }
    (occupied, nearby)
}

fn parse_time(text: &str) -> Result<NaiveTime> {
    parse_hhmm(text).ok_or_else(|| CulturalCenterError::Validation(format!("Invalid time '{}', expected HH:MM", text)))
}

fn validate_capacity(capacity: i32) -> Result<()> {
    if capacity < 1 {
        return Err(CulturalCenterError::Validation("Capacity must be at least 1".to_string()));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(CulturalCenterError::Validation("Price cannot be negative".to_string()));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = tags.into_iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect();
    cleaned.dedup();
    cleaned
}

struct SampleEvent {
    title: &'static str,
    description: &'static str,
    category: EventCategory,
    time: NaiveTime,
    capacity: i32,
    location: &'static str,
    price: f64,
    tags: &'static [&'static str],
}

fn sample_events() -> Vec<SampleEvent> {
    let at = |h: u32, m: u32| NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN);
    vec![
        SampleEvent {
            title: "Ciclo de Cine Dominicano",
            description: "Proyección de largometrajes dominicanos contemporáneos con conversatorio.",
            category: EventCategory::DominicanCinema,
            time: at(19, 0),
            capacity: 80,
            location: "Sala de Cine",
            price: 0.0,
            tags: &["cine", "dominicano"],
        },
        SampleEvent {
            title: "Clásicos del Cine Mundial",
            description: "Una noche con los grandes clásicos restaurados.",
            category: EventCategory::ClassicCinema,
            time: at(18, 30),
            capacity: 80,
            location: "Sala de Cine",
            price: 0.0,
            tags: &["cine", "clásico"],
        },
        SampleEvent {
            title: "Estrenos de la Semana",
            description: "Selección de películas recientes para toda la familia.",
            category: EventCategory::GeneralCinema,
            time: at(17, 0),
            capacity: 100,
            location: "Sala de Cine",
            price: 150.0,
            tags: &["cine", "familia"],
        },
        SampleEvent {
            title: "Taller de Fotografía",
            description: "Técnicas básicas de composición y luz para principiantes.",
            category: EventCategory::Workshops,
            time: at(10, 0),
            capacity: 20,
            location: "Aula 2",
            price: 500.0,
            tags: &["taller", "fotografía"],
        },
        SampleEvent {
            title: "Concierto de Jazz en el Patio",
            description: "Jazz en vivo con músicos locales.",
            category: EventCategory::Concerts,
            time: at(20, 0),
            capacity: 150,
            location: "Patio Central",
            price: 300.0,
            tags: &["música", "jazz"],
        },
        SampleEvent {
            title: "Charla: Patrimonio y Ciudad",
            description: "Conversatorio sobre la conservación del patrimonio de la Ciudad Colonial.",
            category: EventCategory::TalksConferences,
            time: at(16, 0),
            capacity: 60,
            location: "Auditorio",
            price: 0.0,
            tags: &["charla", "patrimonio"],
        },
        SampleEvent {
            title: "Exposición: Color Caribe",
            description: "Muestra colectiva de artistas visuales del Caribe.",
            category: EventCategory::ArtExhibitions,
            time: at(11, 0),
            capacity: 200,
            location: "Galería Principal",
            price: 0.0,
            tags: &["arte", "exposición"],
        },
        SampleEvent {
            title: "Viaje Inmersivo 3D",
            description: "Recorrido audiovisual inmersivo por la historia de la isla.",
            category: EventCategory::ImmersiveExperiences,
            time: at(15, 0),
            capacity: 30,
            location: "Sala Inmersiva",
            price: 250.0,
            tags: &["3d", "inmersivo"],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisConfig;

    fn service() -> EventService {
        EventService::new(DatabaseService::in_memory(), CacheService::local(&RedisConfig::default()))
    }

    fn request(title: &str, time: &str) -> CreateEventRequest {
        CreateEventRequest {
            title: title.to_string(),
            description: String::new(),
            category: "Conciertos".to_string(),
            date: NaiveDate::from_ymd_opt(2030, 5, 10).unwrap(),
            time: time.to_string(),
            capacity: 50,
            location: "Patio".to_string(),
            image_url: None,
            price: 0.0,
            tags: vec![],
            requirements: None,
            contact_info: None,
            published: None,
        }
    }

    #[test]
    fn test_schedule_grid_covers_nine_to_nine_forty_five() {
        let grid = schedule_grid();
        assert_eq!(grid.len(), 13 * 4);
        assert_eq!(format_hhmm(grid[0]), "09:00");
        assert_eq!(format_hhmm(*grid.last().unwrap()), "21:45");
    }

    #[tokio::test]
    async fn test_create_accepts_spanish_category() {
        let svc = service();
        let view = svc.create_event(request("Jazz", "20:00"), Uuid::new_v4()).await.unwrap();
        assert_eq!(view.event.category, EventCategory::Concerts);
        assert_eq!(view.available_spots, 50);
        assert!(view.event.published);
    }

    #[tokio::test]
    async fn test_invalid_category_is_rejected() {
        let svc = service();
        let mut bad = request("Jazz", "20:00");
        bad.category = "Opera".to_string();
        let err = svc.create_event(bad, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CulturalCenterError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_slot_check_reports_occupied_and_nearby() {
        let svc = service();
        let admin = Uuid::new_v4();
        svc.create_event(request("A", "18:00"), admin).await.unwrap();
        svc.create_event(request("B", "19:30"), admin).await.unwrap();
        svc.create_event(request("C", "21:00"), admin).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2030, 5, 10).unwrap();
        let check = svc.check_slot(date, "18:00").await.unwrap();
        assert!(check.occupied);
        assert_eq!(check.occupied_by.len(), 1);
        // 19:30 is 90 minutes away, 21:00 is 180
        assert_eq!(check.nearby.len(), 1);
        assert_eq!(check.nearby[0].title, "B");
    }

    #[tokio::test]
    async fn test_seed_runs_once() {
        let svc = service();
        let admin = Uuid::new_v4();
        assert_eq!(svc.seed_sample_events(admin).await.unwrap(), 8);
        assert_eq!(svc.seed_sample_events(admin).await.unwrap(), 0);
    }
}
