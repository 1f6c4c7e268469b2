//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.
//!
//! Environment variables use the `CCB_` prefix and `__` between nested keys,
//! e.g. `CCB_AUTH__SECRET_KEY` or `CCB_SERVER__PORT`.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Secret shipped in the defaults; refused in production.
pub const DEFAULT_SECRET_KEY: &str = "your-secret-key-change-in-production";

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub email: EmailConfig,
    pub limits: LimitsConfig,
    pub rate_limit: RateLimitSettings,
    pub analytics: AnalyticsConfig,
    pub logging: LoggingConfig,
    pub features: FeaturesConfig,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        }
    }
}

/// General application information
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    pub environment: Environment,
    pub debug: bool,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_seconds: u64,
    pub frontend_url: String,
}

/// Which repository implementation backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub enabled: bool,
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
}

/// Token and bootstrap admin configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub secret_key: String,
    pub algorithm: String,
    pub access_token_expire_minutes: i64,
    pub admin_email: String,
    pub admin_password: String,
    pub admin_name: String,
}

/// Outgoing email (SendGrid) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmailConfig {
    pub sendgrid_api_key: Option<String>,
    pub from_email: String,
    pub from_name: String,
    pub api_url: String,
    pub timeout_seconds: u64,
}

/// Business limits
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_upload_size_mb: usize,
    pub max_users_per_import: usize,
    pub max_reservations_per_user: i64,
    pub default_import_password: String,
}

/// Request rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub requests: u32,
    pub period_seconds: u64,
}

/// Analytics and live dashboard configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    pub metrics_interval_seconds: u64,
    pub active_window_minutes: i64,
    pub segmentation_clusters: usize,
    pub cache_ttl_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<String>,
    pub json: bool,
}

/// Feature flags configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub bootstrap_endpoints: bool,
    pub email_notifications: bool,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::load(None)
    }

    /// Load settings from an explicit configuration file, still honouring environment overrides
    pub fn from_file(path: &Path) -> Result<Self, config::ConfigError> {
        Self::load(Some(path))
    }

    fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file_source = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("config").required(false),
        };

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix("CCB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.allowed_origins"),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Settings for tests and local demos: in-memory storage, no outgoing email
    pub fn for_testing() -> Self {
        let mut settings = Settings::default();
        settings.app.environment = Environment::Testing;
        settings.database.backend = StorageBackend::Memory;
        settings.database.run_migrations = false;
        settings.auth.secret_key = "test-secret-key-with-enough-length".to_string();
        settings.email.sendgrid_api_key = None;
        settings.features.email_notifications = false;
        settings.rate_limit.requests = 1_000;
        settings
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::CulturalCenterError> {
        super::validation::validate_settings(self)
    }

    pub fn is_production(&self) -> bool {
        self.app.environment == Environment::Production
    }

    pub fn is_development(&self) -> bool {
        self.app.environment == Environment::Development
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            redis: RedisConfig::default(),
            auth: AuthConfig::default(),
            email: EmailConfig::default(),
            limits: LimitsConfig::default(),
            rate_limit: RateLimitSettings::default(),
            analytics: AnalyticsConfig::default(),
            logging: LoggingConfig::default(),
            features: FeaturesConfig::default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Cultural Center API".to_string(),
            version: "1.0.0".to_string(),
            environment: Environment::Development,
            debug: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
                "https://culturalcenter.com".to_string(),
            ],
            request_timeout_seconds: 30,
            frontend_url: "http://localhost:3000".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Postgres,
            url: "postgresql://localhost/cultural_center".to_string(),
            max_connections: 10,
            min_connections: 1,
            run_migrations: true,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "redis://localhost:6379".to_string(),
            prefix: "ccb:".to_string(),
            ttl_seconds: 60,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            algorithm: "HS256".to_string(),
            access_token_expire_minutes: 30,
            admin_email: "admin@culturalcenter.com".to_string(),
            admin_password: "admin123".to_string(),
            admin_name: "Administrator".to_string(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            sendgrid_api_key: None,
            from_email: "noreply@culturalcenter.com".to_string(),
            from_name: "Centro Cultural Banreservas".to_string(),
            api_url: "https://api.sendgrid.com/v3/mail/send".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_size_mb: 10,
            max_users_per_import: 1000,
            max_reservations_per_user: 10,
            default_import_password: "changeme123".to_string(),
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: 100,
            period_seconds: 60,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metrics_interval_seconds: 5,
            active_window_minutes: 15,
            segmentation_clusters: 4,
            cache_ttl_seconds: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            json: false,
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            bootstrap_endpoints: true,
            email_notifications: true,
        }
    }
}
