//! Reservation repository, including the check-in log

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::unique_violation_constraint;
use crate::models::reservation::{
    Checkin, CheckinContext, NewReservation, Reservation, ReservationOutcome, ReservationStatus,
    StatusTransition,
};
use crate::utils::errors::Result;

/// Reservation storage. Seat accounting happens here so that it stays atomic.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Insert a confirmed reservation if the event exists, has a free seat, the user holds
    /// no active reservation for it and has fewer than `max_open_per_user` open ones
    async fn create_if_available(&self, new: NewReservation, max_open_per_user: i64) -> Result<ReservationOutcome>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Reservation>>;
    async fn find_by_code(&self, code: &str) -> Result<Option<Reservation>>;
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Reservation>>;
    /// Newest first
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Reservation>>;
    /// Oldest first
    async fn list_for_event(&self, event_id: Uuid) -> Result<Vec<Reservation>>;
    async fn list_all(&self) -> Result<Vec<Reservation>>;
    async fn count_active_by_event(&self) -> Result<HashMap<Uuid, i64>>;
    async fn count_active_for_event(&self, event_id: Uuid) -> Result<i64>;
    /// Cancel a pending or confirmed reservation (and a checked-in one when allowed)
    async fn cancel(&self, id: Uuid, allow_checked_in: bool, at: DateTime<Utc>) -> Result<StatusTransition>;
    /// Mark a pending or confirmed reservation as checked in and log it
    async fn check_in(&self, id: Uuid, context: CheckinContext) -> Result<StatusTransition>;
    /// Cancel every pending or confirmed reservation of a user
    async fn cancel_open_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<u64>;
    /// Check-in log entries, optionally only those at or after `since`, newest first
    async fn list_checkins(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Checkin>>;
}

const RESERVATION_COLUMNS: &str =
    "id, user_id, event_id, status, checkin_code, notes, created_at, updated_at, checked_in_at, cancelled_at";

#[derive(Clone, Debug)]
pub struct PgReservationRepository {
    pool: PgPool,
}

impl PgReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_status(&self, id: Uuid) -> Result<StatusTransition> {
        let status: Option<ReservationStatus> = sqlx::query_scalar("SELECT status FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match status {
            Some(status) => StatusTransition::Rejected(status),
            None => StatusTransition::NotFound,
        })
    }
}

#[async_trait]
impl ReservationRepository for PgReservationRepository {
    async fn create_if_available(&self, new: NewReservation, max_open_per_user: i64) -> Result<ReservationOutcome> {
        let mut tx = self.pool.begin().await?;

        let capacity: Option<i32> = sqlx::query_scalar("SELECT capacity FROM events WHERE id = $1 FOR UPDATE")
            .bind(new.event_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(capacity) = capacity else {
            return Ok(ReservationOutcome::EventNotFound);
        };

        let already: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM reservations WHERE user_id = $1 AND event_id = $2 AND status <> 'cancelled')",
        )
        .bind(new.user_id)
        .bind(new.event_id)
        .fetch_one(&mut *tx)
        .await?;
        if already {
            return Ok(ReservationOutcome::AlreadyReserved);
        }

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reservations WHERE event_id = $1 AND status <> 'cancelled'",
        )
        .bind(new.event_id)
        .fetch_one(&mut *tx)
        .await?;
        if active >= capacity as i64 {
            return Ok(ReservationOutcome::EventFull);
        }

        let open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reservations WHERE user_id = $1 AND status IN ('pending', 'confirmed')",
        )
        .bind(new.user_id)
        .fetch_one(&mut *tx)
        .await?;
        if open >= max_open_per_user {
            return Ok(ReservationOutcome::UserLimitReached);
        }

        let now = Utc::now();
        let inserted = sqlx::query_as::<_, Reservation>(&format!(
            r#"
            INSERT INTO reservations (id, user_id, event_id, status, checkin_code, notes, created_at, updated_at)
            VALUES ($1, $2, $3, 'confirmed', $4, $5, $6, $6)
            RETURNING {}
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.event_id)
        .bind(&new.checkin_code)
        .bind(&new.notes)
        .bind(now)
        .fetch_one(&mut *tx)
        .await;

        let reservation = match inserted {
            Ok(reservation) => reservation,
            Err(e) => {
                return match unique_violation_constraint(&e).as_deref() {
                    Some("idx_reservations_checkin_code") => Ok(ReservationOutcome::CodeCollision),
                    Some("idx_reservations_active_user_event") => Ok(ReservationOutcome::AlreadyReserved),
                    _ => Err(e.into()),
                };
            }
        };

        tx.commit().await?;
        Ok(ReservationOutcome::Created(reservation))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reservation)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE checkin_code = $1",
            RESERVATION_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reservation)
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE id = ANY($1)",
            RESERVATION_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE user_id = $1 ORDER BY created_at DESC",
            RESERVATION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    async fn list_for_event(&self, event_id: Uuid) -> Result<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE event_id = $1 ORDER BY created_at",
            RESERVATION_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    async fn list_all(&self) -> Result<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations ORDER BY created_at DESC",
            RESERVATION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    async fn count_active_by_event(&self) -> Result<HashMap<Uuid, i64>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT event_id, COUNT(*) FROM reservations WHERE status <> 'cancelled' GROUP BY event_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn count_active_for_event(&self, event_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reservations WHERE event_id = $1 AND status <> 'cancelled'",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn cancel(&self, id: Uuid, allow_checked_in: bool, at: DateTime<Utc>) -> Result<StatusTransition> {
        let eligible = if allow_checked_in {
            "('pending', 'confirmed', 'checked_in')"
        } else {
            "('pending', 'confirmed')"
        };

        let updated = sqlx::query_as::<_, Reservation>(&format!(
            r#"
            UPDATE reservations
            SET status = 'cancelled', cancelled_at = $2, updated_at = $2
            WHERE id = $1 AND status IN {}
            RETURNING {}
            "#,
            eligible, RESERVATION_COLUMNS
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(reservation) => Ok(StatusTransition::Applied(reservation)),
            None => self.current_status(id).await,
        }
    }

    async fn check_in(&self, id: Uuid, context: CheckinContext) -> Result<StatusTransition> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Reservation>(&format!(
            r#"
            UPDATE reservations
            SET status = 'checked_in', checked_in_at = $2, updated_at = $2
            WHERE id = $1 AND status IN ('pending', 'confirmed')
            RETURNING {}
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .bind(context.at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(reservation) = updated else {
            drop(tx);
            return self.current_status(id).await;
        };

        sqlx::query(
            r#"
            INSERT INTO checkins (id, reservation_id, user_id, event_id, method, checked_in_by, checked_in_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reservation.id)
        .bind(reservation.user_id)
        .bind(reservation.event_id)
        .bind(context.method)
        .bind(context.staff_id)
        .bind(context.at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(StatusTransition::Applied(reservation))
    }

    async fn cancel_open_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'cancelled', cancelled_at = $2, updated_at = $2
            WHERE user_id = $1 AND status IN ('pending', 'confirmed')
            "#,
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_checkins(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Checkin>> {
        let checkins = sqlx::query_as::<_, Checkin>(
            r#"
            SELECT id, reservation_id, user_id, event_id, method, checked_in_by, checked_in_at
            FROM checkins
            WHERE $1::timestamptz IS NULL OR checked_in_at >= $1
            ORDER BY checked_in_at DESC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(checkins)
    }
}
