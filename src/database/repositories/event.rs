//! Event repository

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::event::{Event, EventChanges, EventFilter, EventUpdateOutcome, NewEvent};
use crate::utils::errors::Result;

/// Event storage
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: NewEvent) -> Result<Event>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>>;
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Event>>;
    /// Events passing the filter, ordered by date then time
    async fn list(&self, filter: &EventFilter) -> Result<Vec<Event>>;
    /// Apply changes; a capacity below the active reservation count is refused atomically
    async fn update(&self, id: Uuid, changes: EventChanges) -> Result<EventUpdateOutcome>;
    /// Delete an event together with its reservations
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

const EVENT_COLUMNS: &str = "id, title, description, category, date, time, capacity, location, image_url, price, tags, requirements, contact_info, published, created_by, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn create(&self, event: NewEvent) -> Result<Event> {
        let now = Utc::now();
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            INSERT INTO events (id, title, description, category, date, time, capacity, location, image_url, price,
                                tags, requirements, contact_info, published, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.category)
        .bind(event.date)
        .bind(event.time)
        .bind(event.capacity)
        .bind(&event.location)
        .bind(&event.image_url)
        .bind(event.price)
        .bind(&event.tags)
        .bind(&event.requirements)
        .bind(&event.contact_info)
        .bind(event.published)
        .bind(event.created_by)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(event)
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!("SELECT {} FROM events WHERE id = ANY($1)", EVENT_COLUMNS))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }

    async fn list(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM events WHERE TRUE", EVENT_COLUMNS));

        if filter.published_only {
            builder.push(" AND published");
        }
        if let Some(category) = filter.category {
            builder.push(" AND category = ").push_bind(category);
        }
        if let Some(from) = filter.date_from {
            builder.push(" AND date >= ").push_bind(from);
        }
        if let Some(to) = filter.date_to {
            builder.push(" AND date <= ").push_bind(to);
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            builder
                .push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR location ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        builder.push(" ORDER BY date, time, created_at");

        let events = builder.build_query_as::<Event>().fetch_all(&self.pool).await?;
        Ok(events)
    }

    async fn update(&self, id: Uuid, changes: EventChanges) -> Result<EventUpdateOutcome> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<(i32,)> = sqlx::query_as("SELECT capacity FROM events WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(EventUpdateOutcome::NotFound);
        }

        if let Some(capacity) = changes.capacity {
            let active: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM reservations WHERE event_id = $1 AND status <> 'cancelled'",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            if (capacity as i64) < active {
                return Ok(EventUpdateOutcome::CapacityBelowReservations { active });
            }
        }

        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                date = COALESCE($5, date),
                time = COALESCE($6, time),
                capacity = COALESCE($7, capacity),
                location = COALESCE($8, location),
                image_url = COALESCE($9, image_url),
                price = COALESCE($10, price),
                tags = COALESCE($11, tags),
                requirements = COALESCE($12, requirements),
                contact_info = COALESCE($13, contact_info),
                published = COALESCE($14, published),
                updated_at = $15
            WHERE id = $1
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.category)
        .bind(changes.date)
        .bind(changes.time)
        .bind(changes.capacity)
        .bind(changes.location)
        .bind(changes.image_url)
        .bind(changes.price)
        .bind(changes.tags)
        .bind(changes.requirements)
        .bind(changes.contact_info)
        .bind(changes.published)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(EventUpdateOutcome::Updated(event))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
