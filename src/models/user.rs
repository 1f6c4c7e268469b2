//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::common::SortOrder;
use super::reservation::ReservationWithEvent;

/// Stored account state. Administrators are flagged separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub location: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_deleted(&self) -> bool {
        self.status == UserStatus::Deleted
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Status as shown in the admin user list
    pub fn display_status(&self) -> &'static str {
        match self.status {
            UserStatus::Deleted => "deleted",
            _ if self.is_admin => "admin",
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }
}

/// Public view of an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub location: Option<String>,
    pub is_admin: bool,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            age: user.age,
            location: user.location.clone(),
            is_admin: user.is_admin,
            status: user.status,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

/// Admin list row: profile plus attendance counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub location: Option<String>,
    pub is_admin: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub total_reservations: i64,
    pub attended_events: i64,
    pub attendance_rate: f64,
}

/// Admin detail view: summary plus the latest reservations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub summary: UserSummary,
    pub recent_reservations: Vec<ReservationWithEvent>,
}

/// Compact user reference embedded in other payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBrief {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl From<&User> for UserBrief {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub location: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl From<AdminCreateUserRequest> for RegisterRequest {
    fn from(request: AdminCreateUserRequest) -> Self {
        Self {
            name: request.name,
            email: request.email,
            password: request.password,
            phone: request.phone,
            age: request.age,
            location: request.location,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub location: Option<String>,
    pub is_admin: Option<bool>,
    pub status: Option<UserStatus>,
    pub password: Option<String>,
}

/// Row to insert; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub location: Option<String>,
    pub password_hash: String,
    pub is_admin: bool,
}

/// Column changes for an update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub location: Option<String>,
    pub is_admin: Option<bool>,
    pub status: Option<UserStatus>,
    pub password_hash: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Status filter of the admin user list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatusFilter {
    Active,
    Inactive,
    Admin,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSortField {
    #[default]
    CreatedAt,
    Name,
    Age,
    Email,
}

/// Filters, ordering and window of the admin user list
#[derive(Debug, Clone, Deserialize)]
pub struct UserQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_user_limit")]
    pub limit: i64,
    pub search: Option<String>,
    pub status_filter: Option<UserStatusFilter>,
    pub location_filter: Option<String>,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    #[serde(default)]
    pub sort_by: UserSortField,
    #[serde(default)]
    pub sort_order: SortOrder,
}

fn default_user_limit() -> i64 {
    super::common::DEFAULT_PAGE_SIZE
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_user_limit(),
            search: None,
            status_filter: None,
            location_filter: None,
            age_min: None,
            age_max: None,
            sort_by: UserSortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl UserQuery {
    /// Whether a user passes every filter of this query
    pub fn matches(&self, user: &User) -> bool {
        let status_ok = match self.status_filter {
            None => !user.is_deleted(),
            Some(UserStatusFilter::Deleted) => user.is_deleted(),
            Some(UserStatusFilter::Admin) => user.is_admin && !user.is_deleted(),
            Some(UserStatusFilter::Active) => user.status == UserStatus::Active,
            Some(UserStatusFilter::Inactive) => user.status == UserStatus::Inactive,
        };
        if !status_ok {
            return false;
        }

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = user.name.to_lowercase().contains(&needle)
                || user.email.to_lowercase().contains(&needle)
                || user.phone.as_deref().is_some_and(|p| p.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if let Some(location) = self.location_filter.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = location.to_lowercase();
            if !user.location.as_deref().is_some_and(|l| l.to_lowercase().contains(&needle)) {
                return false;
            }
        }

        if let Some(min) = self.age_min {
            if !user.age.is_some_and(|age| age >= min) {
                return false;
            }
        }
        if let Some(max) = self.age_max {
            if !user.age.is_some_and(|age| age <= max) {
                return false;
            }
        }

        true
    }

    /// Ordering of two users under this query's sort settings
    pub fn compare(&self, a: &User, b: &User) -> std::cmp::Ordering {
        let ordering = match self.sort_by {
            UserSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            UserSortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            UserSortField::Age => a.age.cmp(&b.age),
            UserSortField::Email => a.email.cmp(&b.email),
        };
        self.sort_order.apply(ordering.then_with(|| a.id.cmp(&b.id)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserBulkAction {
    Delete,
    Activate,
    Deactivate,
    MakeAdmin,
    RemoveAdmin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkUserActionRequest {
    pub user_ids: Vec<Uuid>,
    pub action: UserBulkAction,
}

/// Admin user list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListResponse {
    pub users: Vec<UserSummary>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
    pub page: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkImportResult {
    pub total_processed: usize,
    pub successful_imports: usize,
    pub failed_imports: usize,
    pub duplicate_emails: Vec<String>,
    pub errors: Vec<String>,
    pub imported_users: Vec<ImportedUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMetrics {
    pub total_users: i64,
    pub active_users: i64,
    pub inactive_users: i64,
    pub admin_users: i64,
    pub deleted_users: i64,
    pub recent_registrations: i64,
    pub activity_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, age: Option<i32>, status: UserStatus, is_admin: bool) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: Some("809-555-0101".to_string()),
            age,
            location: Some("Santo Domingo".to_string()),
            password_hash: String::new(),
            is_admin,
            status,
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    #[test]
    fn test_default_query_hides_deleted() {
        let query = UserQuery::default();
        assert!(query.matches(&user("Ana", Some(30), UserStatus::Active, false)));
        assert!(!query.matches(&user("Luis", Some(30), UserStatus::Deleted, false)));

        let deleted = UserQuery {
            status_filter: Some(UserStatusFilter::Deleted),
            ..Default::default()
        };
        assert!(deleted.matches(&user("Luis", Some(30), UserStatus::Deleted, false)));
    }

    #[test]
    fn test_age_and_search_filters() {
        let query = UserQuery {
            search: Some("ANA".to_string()),
            age_min: Some(18),
            age_max: Some(35),
            ..Default::default()
        };
        assert!(query.matches(&user("Ana", Some(30), UserStatus::Active, false)));
        assert!(!query.matches(&user("Ana", Some(40), UserStatus::Active, false)));
        assert!(!query.matches(&user("Ana", None, UserStatus::Active, false)));
        assert!(!query.matches(&user("Pedro", Some(30), UserStatus::Active, false)));
    }

    #[test]
    fn test_display_status() {
        assert_eq!(user("A", None, UserStatus::Active, true).display_status(), "admin");
        assert_eq!(user("A", None, UserStatus::Deleted, true).display_status(), "deleted");
        assert_eq!(user("A", None, UserStatus::Inactive, false).display_status(), "inactive");
    }
}
