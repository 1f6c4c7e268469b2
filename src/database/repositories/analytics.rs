//! Analytics event repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::analytics::{AnalyticsEvent, NewAnalyticsEvent};
use crate::utils::errors::Result;

/// Storage of client-side tracked events
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn record(&self, event: NewAnalyticsEvent) -> Result<AnalyticsEvent>;
    /// Events at or after `since`, optionally of a single type, oldest first
    async fn list_since(&self, since: DateTime<Utc>, event_type: Option<&str>) -> Result<Vec<AnalyticsEvent>>;
}

#[derive(Clone, Debug)]
pub struct PgAnalyticsRepository {
    pool: PgPool,
}

impl PgAnalyticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalyticsRepository for PgAnalyticsRepository {
    async fn record(&self, event: NewAnalyticsEvent) -> Result<AnalyticsEvent> {
        let recorded = sqlx::query_as::<_, AnalyticsEvent>(
            r#"
            INSERT INTO analytics_events (id, event_type, user_id, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, event_type, user_id, metadata, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&event.event_type)
        .bind(event.user_id)
        .bind(&event.metadata)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(recorded)
    }

    async fn list_since(&self, since: DateTime<Utc>, event_type: Option<&str>) -> Result<Vec<AnalyticsEvent>> {
        let events = sqlx::query_as::<_, AnalyticsEvent>(
            r#"
            SELECT id, event_type, user_id, metadata, created_at
            FROM analytics_events
            WHERE created_at >= $1 AND ($2::text IS NULL OR event_type = $2)
            ORDER BY created_at
            "#,
        )
        .bind(since)
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
