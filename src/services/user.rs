//! User service implementation
//!
//! Admin-side account management: listing with attendance counters, profile
//! edits, soft deletion, bulk actions, CSV import and account metrics.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;

use chrono::{Duration, Utc};
use csv::{ReaderBuilder, Trim};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::LimitsConfig;
use crate::database::DatabaseService;
use crate::models::{
    AdminCreateUserRequest, BulkActionResult, BulkImportResult, BulkUserActionRequest, EventBrief, ImportedUser,
    NewUser, PageParams, RegisterRequest, Reservation, ReservationStatus, ReservationWithEvent, UpdateUserRequest,
    User, UserBulkAction, UserChanges, UserDetail, UserListResponse, UserMetrics, UserProfile, UserQuery,
    UserStatus, UserSummary,
};
use crate::services::auth::{AuthService, MIN_PASSWORD_LENGTH};
use crate::services::cache::{CacheService, DASHBOARD_STATS_KEY};
use crate::utils::errors::{CulturalCenterError, Result};
use crate::utils::helpers::{is_valid_email, is_valid_phone, normalize_email, page_number, percentage, total_pages};
use crate::utils::logging::log_admin_action;

const RECENT_RESERVATIONS: usize = 10;
const RECENT_REGISTRATION_DAYS: i64 = 30;

/// Accepted spellings of each import column
const NAME_HEADERS: &[&str] = &["name", "nombre"];
const EMAIL_HEADERS: &[&str] = &["email", "correo"];
const PHONE_HEADERS: &[&str] = &["phone", "telefono", "teléfono"];
const AGE_HEADERS: &[&str] = &["age", "edad"];
const LOCATION_HEADERS: &[&str] = &["location", "ciudad", "ubicacion", "ubicación"];

/// Column positions found in an import header
#[derive(Debug, Clone, Copy)]
struct ImportColumns {
    name: usize,
    email: usize,
    phone: Option<usize>,
    age: Option<usize>,
    location: Option<usize>,
}

impl ImportColumns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |aliases: &[&str]| {
            headers
                .iter()
                .position(|h| aliases.contains(&h.trim().trim_start_matches('\u{feff}').to_lowercase().as_str()))
        };

        match (find(NAME_HEADERS), find(EMAIL_HEADERS)) {
            (Some(name), Some(email)) => Ok(Self {
                name,
                email,
                phone: find(PHONE_HEADERS),
                age: find(AGE_HEADERS),
                location: find(LOCATION_HEADERS),
            }),
            _ => Err(CulturalCenterError::InvalidInput(
                "CSV must contain 'name' and 'email' columns".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserService {
    db: DatabaseService,
    auth: AuthService,
    cache: CacheService,
    limits: LimitsConfig,
}

impl UserService {
    pub fn new(db: DatabaseService, auth: AuthService, cache: CacheService, limits: LimitsConfig) -> Self {
        Self {
            db,
            auth,
            cache,
            limits,
        }
    }

    /// Attendance counters for one account
    pub fn summarize(user: &User, reservations: &[Reservation]) -> UserSummary {
        let non_cancelled = reservations.iter().filter(|r| r.status.is_active()).count() as i64;
        let attended = reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::CheckedIn)
            .count() as i64;

        UserSummary {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            age: user.age,
            location: user.location.clone(),
            is_admin: user.is_admin,
            status: user.display_status().to_string(),
            created_at: user.created_at,
            last_login: user.last_login,
            total_reservations: reservations.len() as i64,
            attended_events: attended,
            attendance_rate: percentage(attended, non_cancelled),
        }
    }

    pub async fn list(&self, query: UserQuery) -> Result<UserListResponse> {
        let params = PageParams::new(query.skip, query.limit).validated()?;
        if let (Some(min), Some(max)) = (query.age_min, query.age_max) {
            if min > max {
                return Err(CulturalCenterError::Validation(
                    "age_min cannot be greater than age_max".to_string(),
                ));
            }
        }

        let page = self.db.users.list(&query).await?;
        let mut users = Vec::with_capacity(page.items.len());
        for user in &page.items {
            let reservations = self.db.reservations.list_for_user(user.id).await?;
            users.push(Self::summarize(user, &reservations));
        }

        Ok(UserListResponse {
            users,
            total: page.total,
            skip: params.skip,
            limit: params.limit,
            page: page_number(params.skip, params.limit),
            pages: total_pages(page.total, params.limit),
        })
    }

    async fn find(&self, user_id: Uuid) -> Result<User> {
        self.db
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(CulturalCenterError::UserNotFound { user_id })
    }

    pub async fn detail(&self, user_id: Uuid) -> Result<UserDetail> {
        let user = self.find(user_id).await?;
        let reservations = self.db.reservations.list_for_user(user_id).await?;
        let summary = Self::summarize(&user, &reservations);

        let recent: Vec<Reservation> = reservations.into_iter().take(RECENT_RESERVATIONS).collect();
        let event_ids: Vec<Uuid> = recent.iter().map(|r| r.event_id).collect();
        let events: HashMap<Uuid, _> = self
            .db
            .events
            .find_many(&event_ids)
            .await?
            .into_iter()
            .map(|e| (e.id, e))
            .collect();

        Ok(UserDetail {
            summary,
            recent_reservations: recent
                .into_iter()
                .map(|reservation| ReservationWithEvent {
                    event: events.get(&reservation.event_id).map(EventBrief::from),
                    reservation,
                })
                .collect(),
        })
    }

    pub async fn create(&self, request: AdminCreateUserRequest, admin_id: Uuid) -> Result<UserProfile> {
        let is_admin = request.is_admin;
        let user = self.auth.create_account(request.into(), is_admin).await?;
        log_admin_action(admin_id, "create_user", Some(&user.id.to_string()), Some(&user.email));
        Ok(UserProfile::from(&user))
    }

    pub async fn update(&self, user_id: Uuid, request: UpdateUserRequest, admin_id: Uuid) -> Result<UserProfile> {
        let existing = self.find(user_id).await?;

        if user_id == admin_id {
            if request.is_admin == Some(false) {
                return Err(CulturalCenterError::InvalidInput(
                    "You cannot remove your own admin rights".to_string(),
                ));
            }
            if request.status == Some(UserStatus::Inactive) {
                return Err(CulturalCenterError::InvalidInput(
                    "You cannot deactivate your own account".to_string(),
                ));
            }
        }
        if request.status == Some(UserStatus::Deleted) {
            return Err(CulturalCenterError::Validation(
                "Status must be 'active' or 'inactive'".to_string(),
            ));
        }

        let mut changes = UserChanges {
            is_admin: request.is_admin,
            status: request.status,
            location: request.location.map(|l| l.trim().to_string()),
            ..Default::default()
        };

        if let Some(name) = request.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CulturalCenterError::Validation("Name is required".to_string()));
            }
            changes.name = Some(name);
        }
        if let Some(email) = request.email {
            let email = normalize_email(&email);
            if !is_valid_email(&email) {
                return Err(CulturalCenterError::Validation("Invalid email address".to_string()));
            }
            if email != existing.email {
                changes.email = Some(email);
            }
        }
        if let Some(phone) = request.phone {
            let phone = phone.trim().to_string();
            if !phone.is_empty() && !is_valid_phone(&phone) {
                return Err(CulturalCenterError::Validation("Invalid phone number".to_string()));
            }
            changes.phone = Some(phone);
        }
        if let Some(age) = request.age {
            if !(1..=120).contains(&age) {
                return Err(CulturalCenterError::Validation("Age must be between 1 and 120".to_string()));
            }
            changes.age = Some(age);
        }
        if let Some(password) = request.password {
            if password.chars().count() < MIN_PASSWORD_LENGTH {
                return Err(CulturalCenterError::Validation(format!(
                    "Password must be at least {} characters long",
                    MIN_PASSWORD_LENGTH
                )));
            }
            changes.password_hash = Some(AuthService::hash_password(&password).await?);
        }

        let user = self
            .db
            .users
            .update(user_id, changes)
            .await?
            .ok_or(CulturalCenterError::UserNotFound { user_id })?;

        log_admin_action(admin_id, "update_user", Some(&user_id.to_string()), None);
        self.cache.invalidate(DASHBOARD_STATS_KEY).await;
        Ok(UserProfile::from(&user))
    }

    /// Soft delete: mark the account deleted and cancel its open reservations
    pub async fn delete(&self, user_id: Uuid, admin_id: Uuid) -> Result<()> {
        if user_id == admin_id {
            return Err(CulturalCenterError::InvalidInput(
                "You cannot delete your own account".to_string(),
            ));
        }
        let user = self.find(user_id).await?;
        if user.is_deleted() {
            return Err(CulturalCenterError::UserNotFound { user_id });
        }

        self.soft_delete(&[user_id]).await?;
        log_admin_action(admin_id, "delete_user", Some(&user_id.to_string()), Some(&user.email));
        Ok(())
    }

    async fn soft_delete(&self, ids: &[Uuid]) -> Result<u64> {
        let affected = self.db.users.set_status(ids, UserStatus::Deleted).await?;
        let now = Utc::now();
        for id in ids {
            let cancelled = self.db.reservations.cancel_open_for_user(*id, now).await?;
            if cancelled > 0 {
                debug!(user_id = %id, cancelled = cancelled, "Reservations cancelled for deleted user");
            }
        }
        self.cache.invalidate(DASHBOARD_STATS_KEY).await;
        Ok(affected)
    }

    pub async fn bulk_action(&self, request: BulkUserActionRequest, admin_id: Uuid) -> Result<BulkActionResult> {
        let protects_self = matches!(
            request.action,
            UserBulkAction::Delete | UserBulkAction::Deactivate | UserBulkAction::RemoveAdmin
        );
        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = request
            .user_ids
            .into_iter()
            .filter(|id| !(protects_self && *id == admin_id))
            .filter(|id| seen.insert(*id))
            .collect();

        let (affected, verb) = match request.action {
            UserBulkAction::Delete => (self.soft_delete(&ids).await?, "deleted"),
            UserBulkAction::Activate => (self.db.users.set_status(&ids, UserStatus::Active).await?, "activated"),
            UserBulkAction::Deactivate => (
                self.db.users.set_status(&ids, UserStatus::Inactive).await?,
                "deactivated",
            ),
            UserBulkAction::MakeAdmin => (self.db.users.set_admin(&ids, true).await?, "promoted to admin"),
            UserBulkAction::RemoveAdmin => (self.db.users.set_admin(&ids, false).await?, "removed from admin"),
        };

        log_admin_action(
            admin_id,
            "bulk_user_action",
            None,
            Some(&format!("{} {} of {}", verb, affected, ids.len())),
        );
        if affected > 0 {
            self.cache.invalidate(DASHBOARD_STATS_KEY).await;
        }

        Ok(BulkActionResult {
            message: format!("{} users {}", affected, verb),
            affected_count: affected,
        })
    }

    /// Import accounts from a CSV upload. Row numbers in messages are 1-based with the header as row 1.
    pub async fn bulk_import(
        &self,
        filename: &str,
        data: &[u8],
        default_password: Option<String>,
        admin_id: Uuid,
    ) -> Result<BulkImportResult> {
        if !filename.to_lowercase().ends_with(".csv") {
            return Err(CulturalCenterError::InvalidInput("Only CSV files are supported".to_string()));
        }
        let max_bytes = self.limits.max_upload_size_mb * 1024 * 1024;
        if data.len() > max_bytes {
            return Err(CulturalCenterError::PayloadTooLarge(format!(
                "File exceeds the {} MB limit",
                self.limits.max_upload_size_mb
            )));
        }

        let password = default_password
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.limits.default_import_password.clone());
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(CulturalCenterError::Validation(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(Cursor::new(data));

        let headers = reader
            .headers()
            .map_err(|_| CulturalCenterError::InvalidInput("CSV file must be UTF-8 encoded".to_string()))?;
        let columns = ImportColumns::from_headers(headers)?;
        let records = reader
            .records()
            .collect::<std::result::Result<Vec<_>, csv::Error>>()
            .map_err(|e| CulturalCenterError::InvalidInput(format!("Malformed CSV: {}", e)))?;

        if records.len() > self.limits.max_users_per_import {
            return Err(CulturalCenterError::InvalidInput(format!(
                "Too many rows: at most {} users can be imported at once",
                self.limits.max_users_per_import
            )));
        }

        // One hash shared by every imported account
        let password_hash = AuthService::hash_password(&password).await?;
        let mut result = BulkImportResult::default();
        let mut seen_in_file: HashSet<String> = HashSet::new();

        for (index, record) in records.iter().enumerate() {
            let row = index + 2;
            result.total_processed += 1;

            let field = |idx: Option<usize>| {
                idx.and_then(|i| record.get(i))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };

            let email = field(Some(columns.email)).map(|e| normalize_email(&e)).unwrap_or_default();
            if !email.is_empty() && !seen_in_file.insert(email.clone()) {
                result.failed_imports += 1;
                result.duplicate_emails.push(email);
                continue;
            }

            let age = match field(columns.age) {
                Some(raw) => match raw.parse::<i32>() {
                    Ok(age) => Some(age),
                    Err(_) => {
                        result.failed_imports += 1;
                        result.errors.push(format!("Row {}: invalid age '{}'", row, raw));
                        continue;
                    }
                },
                None => None,
            };

            let request = RegisterRequest {
                name: field(Some(columns.name)).unwrap_or_default(),
                email,
                password: password.clone(),
                phone: field(columns.phone),
                age,
                location: field(columns.location),
            };

            let request = match AuthService::validate_registration(request) {
                Ok(request) => request,
                Err(e) => {
                    result.failed_imports += 1;
                    result.errors.push(format!("Row {}: {}", row, error_detail(&e)));
                    continue;
                }
            };

            if self.db.users.find_by_email(&request.email).await?.is_some() {
                result.failed_imports += 1;
                result.duplicate_emails.push(request.email);
                continue;
            }

            let created = self
                .db
                .users
                .create(NewUser {
                    name: request.name,
                    email: request.email.clone(),
                    phone: request.phone,
                    age: request.age,
                    location: request.location,
                    password_hash: password_hash.clone(),
                    is_admin: false,
                })
                .await;

            match created {
                Ok(user) => {
                    result.successful_imports += 1;
                    result.imported_users.push(ImportedUser {
                        id: user.id,
                        name: user.name,
                        email: user.email,
                    });
                }
                Err(CulturalCenterError::Conflict(_)) => {
                    result.failed_imports += 1;
                    result.duplicate_emails.push(request.email);
                }
                Err(e) => {
                    result.failed_imports += 1;
                    result.errors.push(format!("Row {}: {}", row, error_detail(&e)));
                }
            }
        }

        info!(
            admin_id = %admin_id,
            processed = result.total_processed,
            imported = result.successful_imports,
            failed = result.failed_imports,
            "Bulk user import finished"
        );
        log_admin_action(admin_id, "bulk_import_users", Some(filename), None);
        if result.successful_imports > 0 {
            self.cache.invalidate(DASHBOARD_STATS_KEY).await;
        }

        Ok(result)
    }

    pub async fn metrics(&self) -> Result<UserMetrics> {
        let users = self.db.users.list_all().await?;
        let since = Utc::now() - Duration::days(RECENT_REGISTRATION_DAYS);

        let live: Vec<&User> = users.iter().filter(|u| !u.is_deleted()).collect();
        let total = live.len() as i64;
        let active = live.iter().filter(|u| u.status == UserStatus::Active).count() as i64;

        Ok(UserMetrics {
            total_users: total,
            active_users: active,
            inactive_users: live.iter().filter(|u| u.status == UserStatus::Inactive).count() as i64,
            admin_users: live.iter().filter(|u| u.is_admin).count() as i64,
            deleted_users: (users.len() - live.len()) as i64,
            recent_registrations: live.iter().filter(|u| u.created_at >= since).count() as i64,
            activity_rate: percentage(active, total),
        })
    }
}

/// Message without the error-kind prefix
fn error_detail(error: &CulturalCenterError) -> String {
    match error {
        CulturalCenterError::Validation(msg)
        | CulturalCenterError::InvalidInput(msg)
        | CulturalCenterError::Conflict(msg) => msg.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_headers_accept_spanish_aliases() {
        let headers = csv::StringRecord::from(vec!["Nombre", "Correo", "Teléfono", "Edad", "Ciudad"]);
        let columns = ImportColumns::from_headers(&headers).unwrap();
        assert_eq!(columns.name, 0);
        assert_eq!(columns.email, 1);
        assert_eq!(columns.phone, Some(2));
        assert_eq!(columns.age, Some(3));
        assert_eq!(columns.location, Some(4));
    }

    #[test]
    fn test_import_headers_require_name_and_email() {
        let headers = csv::StringRecord::from(vec!["name", "phone"]);
        assert!(ImportColumns::from_headers(&headers).is_err());
    }
}
