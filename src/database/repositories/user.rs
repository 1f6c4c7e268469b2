//! User repository

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::is_unique_violation;
use crate::models::common::Page;
use crate::models::user::{NewUser, User, UserChanges, UserQuery, UserSortField, UserStatus, UserStatusFilter};
use crate::utils::errors::{CulturalCenterError, Result};

/// Account storage
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; a taken email yields `Conflict`
    async fn create(&self, user: NewUser) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    /// Case-insensitive lookup, deleted accounts included
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Non-deleted users whose phone has exactly these digits
    async fn find_by_phone(&self, phone_digits: &str) -> Result<Vec<User>>;
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>>;
    /// Returns the number of rows whose status actually changed
    async fn set_status(&self, ids: &[Uuid], status: UserStatus) -> Result<u64>;
    /// Returns the number of rows whose admin flag actually changed
    async fn set_admin(&self, ids: &[Uuid], is_admin: bool) -> Result<u64>;
    async fn list(&self, query: &UserQuery) -> Result<Page<User>>;
    /// Every account, deleted ones included
    async fn list_all(&self) -> Result<Vec<User>>;
}

const USER_COLUMNS: &str = "id, name, email, phone, age, location, password_hash, is_admin, status, created_at, updated_at, last_login";

#[derive(Clone, Debug)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_user_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &UserQuery) {
    match query.status_filter {
        None => {
            builder.push(" AND status <> 'deleted'");
        }
        Some(UserStatusFilter::Deleted) => {
            builder.push(" AND status = 'deleted'");
        }
        Some(UserStatusFilter::Admin) => {
            builder.push(" AND is_admin AND status <> 'deleted'");
        }
        Some(UserStatusFilter::Active) => {
            builder.push(" AND status = 'active'");
        }
        Some(UserStatusFilter::Inactive) => {
            builder.push(" AND status = 'inactive'");
        }
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR phone ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(location) = query.location_filter.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        builder.push(" AND location ILIKE ").push_bind(format!("%{}%", location));
    }

    if let Some(min) = query.age_min {
        builder.push(" AND age >= ").push_bind(min);
    }
    if let Some(max) = query.age_max {
        builder.push(" AND age <= ").push_bind(max);
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> Result<User> {
        let now = Utc::now();
        let result = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, name, email, phone, age, location, password_hash, is_admin, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'active', $9, $9)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.age)
        .bind(&user.location)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => {
                Err(CulturalCenterError::Conflict("Email already registered".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_phone(&self, phone_digits: &str) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE regexp_replace(phone, '\\D', '', 'g') = $1 AND status <> 'deleted'",
            USER_COLUMNS
        ))
        .bind(phone_digits)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ANY($1)", USER_COLUMNS))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>> {
        let result = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                age = COALESCE($5, age),
                location = COALESCE($6, location),
                is_admin = COALESCE($7, is_admin),
                status = COALESCE($8, status),
                password_hash = COALESCE($9, password_hash),
                last_login = COALESCE($10, last_login),
                updated_at = $11
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.phone)
        .bind(changes.age)
        .bind(changes.location)
        .bind(changes.is_admin)
        .bind(changes.status)
        .bind(changes.password_hash)
        .bind(changes.last_login)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => {
                Err(CulturalCenterError::Conflict("Email already registered".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_status(&self, ids: &[Uuid], status: UserStatus) -> Result<u64> {
        let result = sqlx::query("UPDATE users SET status = $2, updated_at = $3 WHERE id = ANY($1) AND status <> $2")
            .bind(ids)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn set_admin(&self, ids: &[Uuid], is_admin: bool) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE users SET is_admin = $2, updated_at = $3 WHERE id = ANY($1) AND is_admin <> $2 AND status <> 'deleted'",
        )
        .bind(ids)
        .bind(is_admin)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list(&self, query: &UserQuery) -> Result<Page<User>> {
        let mut count_builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE TRUE");
        push_user_filters(&mut count_builder, query);
        let total: i64 = count_builder.build_query_scalar().fetch_one(&self.pool).await?;

        let order = query.sort_order.as_sql();
        let sort_column = match query.sort_by {
            UserSortField::CreatedAt => "created_at".to_string(),
            UserSortField::Name => "LOWER(name)".to_string(),
            UserSortField::Email => "email".to_string(),
            UserSortField::Age => {
                let nulls = if order == "ASC" { "NULLS FIRST" } else { "NULLS LAST" };
                format!("age {} {}", order, nulls)
            }
        };

        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM users WHERE TRUE", USER_COLUMNS));
        push_user_filters(&mut builder, query);
        builder.push(" ORDER BY ").push(sort_column);
        if query.sort_by != UserSortField::Age {
            builder.push(" ").push(order);
        }
        builder
            .push(", id ")
            .push(order)
            .push(" LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.skip);

        let items = builder.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok(Page { items, total })
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users ORDER BY created_at", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }
}
