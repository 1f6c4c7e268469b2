//! Authentication service implementation
//!
//! Registration, login and bearer-token handling. Passwords are stored as
//! Argon2id PHC strings and hashed on the blocking pool; tokens are signed JWTs
//! carrying the user id and admin flag.

use std::str::FromStr;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::database::DatabaseService;
use crate::models::{LoginRequest, NewUser, RegisterRequest, User, UserChanges, UserProfile, UserStatus};
use crate::services::cache::{CacheService, DASHBOARD_STATS_KEY};
use crate::services::notification::NotificationService;
use crate::utils::errors::{CulturalCenterError, Result};
use crate::utils::helpers::{is_valid_email, is_valid_phone, normalize_email};
use crate::utils::logging::log_user_action;

pub const MIN_PASSWORD_LENGTH: usize = 6;

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_TOKEN: &str = "Could not validate credentials";

/// JWT payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserProfile,
}

#[derive(Clone)]
pub struct AuthService {
    db: DatabaseService,
    config: AuthConfig,
    cache: CacheService,
    notifications: NotificationService,
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(
        db: DatabaseService,
        config: AuthConfig,
        cache: CacheService,
        notifications: NotificationService,
    ) -> Result<Self> {
        let algorithm = Algorithm::from_str(&config.algorithm)
            .map_err(|_| CulturalCenterError::Config(format!("Unsupported JWT algorithm: {}", config.algorithm)))?;
        let encoding_key = EncodingKey::from_secret(config.secret_key.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret_key.as_bytes());

        Ok(Self {
            db,
            config,
            cache,
            notifications,
            algorithm,
            encoding_key,
            decoding_key,
        })
    }

    /// Hash a password on the blocking pool
    pub async fn hash_password(password: &str) -> Result<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| CulturalCenterError::Internal(format!("Password hashing failed: {}", e)))
        })
        .await
        .map_err(|e| CulturalCenterError::Internal(format!("Hashing task failed: {}", e)))?
    }

    /// Verify a password against a stored PHC string on the blocking pool
    pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || {
            let Ok(parsed) = PasswordHash::new(&hash) else {
                return false;
            };
            Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
        })
        .await
        .map_err(|e| CulturalCenterError::Internal(format!("Verification task failed: {}", e)))
    }

    /// Trim and check a registration payload
    pub fn validate_registration(request: RegisterRequest) -> Result<RegisterRequest> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(CulturalCenterError::Validation("Name is required".to_string()));
        }

        let email = normalize_email(&request.email);
        if !is_valid_email(&email) {
            return Err(CulturalCenterError::Validation("Invalid email address".to_string()));
        }

        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(CulturalCenterError::Validation(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )));
        }

        if let Some(age) = request.age {
            if !(1..=120).contains(&age) {
                return Err(CulturalCenterError::Validation("Age must be between 1 and 120".to_string()));
            }
        }

        let phone = request.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
        if let Some(phone) = phone.as_deref() {
            if !is_valid_phone(phone) {
                return Err(CulturalCenterError::Validation("Invalid phone number".to_string()));
            }
        }

        Ok(RegisterRequest {
            name,
            email,
            password: request.password,
            phone,
            age: request.age,
            location: request.location.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
        })
    }

    /// Validate, hash and insert a new account
    pub async fn create_account(&self, request: RegisterRequest, is_admin: bool) -> Result<User> {
        let request = Self::validate_registration(request)?;

        if self.db.users.find_by_email(&request.email).await?.is_some() {
            return Err(CulturalCenterError::Conflict("Email already registered".to_string()));
        }

        let password_hash = Self::hash_password(&request.password).await?;
        let user = self
            .db
            .users
            .create(NewUser {
                name: request.name,
                email: request.email,
                phone: request.phone,
                age: request.age,
                location: request.location,
                password_hash,
                is_admin,
            })
            .await?;

        log_user_action(user.id, "account_created", Some(&user.email));
        self.cache.invalidate(DASHBOARD_STATS_KEY).await;
        Ok(user)
    }

    /// Public registration: creates a regular account and signs the user in
    pub async fn register(&self, request: RegisterRequest) -> Result<TokenResponse> {
        let user = self.create_account(request, false).await?;
        self.notifications.notify_welcome(&user);
        self.issue_token(&user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<TokenResponse> {
        let email = normalize_email(&request.email);

        let Some(user) = self.db.users.find_by_email(&email).await? else {
            debug!(email = %email, "Login for unknown email");
            return Err(CulturalCenterError::Authentication(INVALID_CREDENTIALS.to_string()));
        };
        if user.is_deleted() {
            return Err(CulturalCenterError::Authentication(INVALID_CREDENTIALS.to_string()));
        }
        if !Self::verify_password(&request.password, &user.password_hash).await? {
            warn!(user_id = %user.id, "Login with wrong password");
            return Err(CulturalCenterError::Authentication(INVALID_CREDENTIALS.to_string()));
        }
        if user.status == UserStatus::Inactive {
            return Err(CulturalCenterError::PermissionDenied("Account is inactive".to_string()));
        }

        let changes = UserChanges {
            last_login: Some(Utc::now()),
            ..Default::default()
        };
        let user = self.db.users.update(user.id, changes).await?.unwrap_or(user);

        log_user_action(user.id, "login", None);
        self.issue_token(&user)
    }

    /// Sign a token for a user
    pub fn issue_token(&self, user: &User) -> Result<TokenResponse> {
        let access_token = self.encode_claims(user.id, user.is_admin, self.config.access_token_expire_minutes)?;

        Ok(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.config.access_token_expire_minutes * 60,
            user: UserProfile::from(user),
        })
    }

    /// Encode claims expiring `expire_minutes` from now (negative values yield expired tokens)
    pub fn encode_claims(&self, user_id: Uuid, is_admin: bool, expire_minutes: i64) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(expire_minutes)).timestamp(),
            is_admin,
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| CulturalCenterError::Internal(format!("Token encoding failed: {}", e)))
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => CulturalCenterError::TokenExpired,
                _ => CulturalCenterError::Authentication(INVALID_TOKEN.to_string()),
            })
    }

    /// Resolve a bearer token to an active account
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.decode_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| CulturalCenterError::Authentication(INVALID_TOKEN.to_string()))?;

        match self.db.users.find_by_id(user_id).await? {
            Some(user) if user.is_active() => Ok(user),
            _ => Err(CulturalCenterError::Authentication(INVALID_TOKEN.to_string())),
        }
    }

    /// Create the configured administrator, or promote the existing account.
    /// Returns the account and whether it was newly created.
    pub async fn ensure_admin_account(&self) -> Result<(User, bool)> {
        let email = normalize_email(&self.config.admin_email);

        if let Some(existing) = self.db.users.find_by_email(&email).await? {
            if existing.is_admin && existing.is_active() {
                return Ok((existing, false));
            }
            let changes = UserChanges {
                is_admin: Some(true),
                status: Some(UserStatus::Active),
                ..Default::default()
            };
            let promoted = self
                .db
                .users
                .update(existing.id, changes)
                .await?
                .ok_or(CulturalCenterError::UserNotFound { user_id: existing.id })?;
            info!(user_id = %promoted.id, "Existing account promoted to administrator");
            return Ok((promoted, false));
        }

        let request = RegisterRequest {
            name: self.config.admin_name.clone(),
            email,
            password: self.config.admin_password.clone(),
            phone: None,
            age: None,
            location: None,
        };
        let admin = self.create_account(request, true).await?;
        info!(user_id = %admin.id, email = %admin.email, "Administrator account created");
        Ok((admin, true))
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").field("algorithm", &self.algorithm).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmailConfig, RedisConfig};
    use assert_matches::assert_matches;

    fn service() -> AuthService {
        let config = AuthConfig {
            secret_key: "test-secret-key-with-enough-length".to_string(),
            ..AuthConfig::default()
        };
        let notifications = NotificationService::new(EmailConfig::default(), false).unwrap();
        AuthService::new(
            DatabaseService::in_memory(),
            config,
            CacheService::local(&RedisConfig::default()),
            notifications,
        )
        .unwrap()
    }

    fn registration(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: " Ana Pérez ".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            phone: None,
            age: Some(28),
            location: None,
        }
    }

    #[tokio::test]
    async fn test_password_hash_roundtrip() {
        let hash = AuthService::hash_password("secreto123").await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(AuthService::verify_password("secreto123", &hash).await.unwrap());
        assert!(!AuthService::verify_password("otro", &hash).await.unwrap());
    }

    #[test]
    fn test_registration_validation() {
        let ok = AuthService::validate_registration(registration(" Ana@Example.COM ", "secreto")).unwrap();
        assert_eq!(ok.email, "ana@example.com");
        assert_eq!(ok.name, "Ana Pérez");

        assert_matches!(
            AuthService::validate_registration(registration("ana@example.com", "123")),
            Err(CulturalCenterError::Validation(_))
        );
        assert_matches!(
            AuthService::validate_registration(registration("not-an-email", "secreto")),
            Err(CulturalCenterError::Validation(_))
        );
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let auth = service();
        let registered = auth.register(registration("ana@example.com", "secreto")).await.unwrap();
        assert_eq!(registered.token_type, "bearer");

        let login = LoginRequest {
            email: "ANA@example.com".to_string(),
            password: "secreto".to_string(),
        };
        let token = auth.login(login).await.unwrap();
        let user = auth.authenticate(&token.access_token).await.unwrap();
        assert_eq!(user.email, "ana@example.com");
        assert!(user.last_login.is_some());
    }

    #[tokio::test]
    async fn test_expired_token_is_reported() {
        let auth = service();
        let token = auth.encode_claims(Uuid::new_v4(), false, -5).unwrap();
        assert_matches!(auth.decode_token(&token), Err(CulturalCenterError::TokenExpired));
        assert_matches!(auth.decode_token("garbage"), Err(CulturalCenterError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let auth = service();
        let (first, created) = auth.ensure_admin_account().await.unwrap();
        assert!(created);
        assert!(first.is_admin);

        let (second, created) = auth.ensure_admin_account().await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }
}
