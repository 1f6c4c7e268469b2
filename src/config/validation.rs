//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use super::settings::{DEFAULT_SECRET_KEY, Environment, StorageBackend};
use super::Settings;
use crate::utils::errors::{CulturalCenterError, Result};

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_server_config(&settings.server)?;
    validate_database_config(&settings.database)?;
    validate_redis_config(&settings.redis)?;
    validate_auth_config(&settings.auth, settings.app.environment)?;
    validate_email_config(&settings.email)?;
    validate_limits_config(&settings.limits)?;
    validate_rate_limit_config(&settings.rate_limit)?;
    validate_analytics_config(&settings.analytics)?;
    validate_logging_config(&settings.logging)?;

    if settings.is_production() {
        validate_production(settings)?;
    }

    Ok(())
}

/// Validate server configuration
fn validate_server_config(config: &super::ServerConfig) -> Result<()> {
    if config.port == 0 {
        return Err(CulturalCenterError::Config(
            "Server port must be greater than 0".to_string()
        ));
    }

    if config.request_timeout_seconds == 0 {
        return Err(CulturalCenterError::Config(
            "Request timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.backend == StorageBackend::Memory {
        return Ok(());
    }

    if config.url.is_empty() {
        return Err(CulturalCenterError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(CulturalCenterError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(CulturalCenterError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.enabled && config.url.is_empty() {
        return Err(CulturalCenterError::Config(
            "Redis URL is required when Redis is enabled".to_string()
        ));
    }

    if config.ttl_seconds == 0 {
        return Err(CulturalCenterError::Config(
            "Redis TTL must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate token configuration
fn validate_auth_config(config: &super::AuthConfig, environment: Environment) -> Result<()> {
    if config.secret_key.is_empty() {
        return Err(CulturalCenterError::Config(
            "Secret key is required".to_string()
        ));
    }

    if environment != Environment::Development && config.secret_key.len() < 16 {
        return Err(CulturalCenterError::Config(
            "Secret key must be at least 16 characters long".to_string()
        ));
    }

    if !matches!(config.algorithm.as_str(), "HS256" | "HS384" | "HS512") {
        return Err(CulturalCenterError::Config(
            format!("Unsupported token algorithm: {}", config.algorithm)
        ));
    }

    if config.access_token_expire_minutes <= 0 {
        return Err(CulturalCenterError::Config(
            "Token lifetime must be greater than 0 minutes".to_string()
        ));
    }

    Ok(())
}

/// Validate email configuration
fn validate_email_config(config: &super::EmailConfig) -> Result<()> {
    url::Url::parse(&config.api_url)?;

    if !crate::utils::helpers::is_valid_email(&config.from_email) {
        return Err(CulturalCenterError::Config(
            format!("Invalid sender address: {}", config.from_email)
        ));
    }

    Ok(())
}

/// Validate business limits
fn validate_limits_config(config: &super::LimitsConfig) -> Result<()> {
    if config.max_upload_size_mb == 0 {
        return Err(CulturalCenterError::Config(
            "Max upload size must be greater than 0".to_string()
        ));
    }

    if config.max_users_per_import == 0 {
        return Err(CulturalCenterError::Config(
            "Max users per import must be greater than 0".to_string()
        ));
    }

    if config.max_reservations_per_user <= 0 {
        return Err(CulturalCenterError::Config(
            "Max reservations per user must be greater than 0".to_string()
        ));
    }

    Ok(())
}

fn validate_rate_limit_config(config: &super::RateLimitSettings) -> Result<()> {
    if config.enabled && (config.requests == 0 || config.period_seconds == 0) {
        return Err(CulturalCenterError::Config(
            "Rate limit requests and period must be greater than 0".to_string()
        ));
    }

    Ok(())
}

fn validate_analytics_config(config: &super::AnalyticsConfig) -> Result<()> {
    if config.metrics_interval_seconds == 0 {
        return Err(CulturalCenterError::Config(
            "Metrics interval must be greater than 0".to_string()
        ));
    }

    if config.segmentation_clusters == 0 {
        return Err(CulturalCenterError::Config(
            "At least one segmentation cluster is required".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(CulturalCenterError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    let base_level = config.level.split(',').next().unwrap_or_default();
    if !valid_levels.contains(&base_level) {
        return Err(CulturalCenterError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}

/// Rules that only apply to production deployments
fn validate_production(settings: &Settings) -> Result<()> {
    if settings.auth.secret_key == DEFAULT_SECRET_KEY {
        return Err(CulturalCenterError::Config(
            "Secret key must be changed in production".to_string()
        ));
    }

    if settings.app.debug {
        return Err(CulturalCenterError::Config(
            "Debug mode must be disabled in production".to_string()
        ));
    }

    if settings.features.email_notifications && settings.email.sendgrid_api_key.is_none() {
        return Err(CulturalCenterError::Config(
            "SendGrid API key is required in production".to_string()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(validate_settings(&Settings::default()).is_ok());
        assert!(validate_settings(&Settings::for_testing()).is_ok());
    }

    #[test]
    fn test_production_rejects_default_secret() {
        let mut settings = Settings::default();
        settings.app.environment = Environment::Production;
        settings.app.debug = false;
        settings.email.sendgrid_api_key = Some("SG.key".to_string());

        let err = validate_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("Secret key must be changed"));

        settings.auth.secret_key = "a-long-production-secret-value".to_string();
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_production_requires_sendgrid_key() {
        let mut settings = Settings::default();
        settings.app.environment = Environment::Production;
        settings.app.debug = false;
        settings.auth.secret_key = "a-long-production-secret-value".to_string();

        let err = validate_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("SendGrid"));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut settings = Settings::default();
        settings.logging.level = "verbose".to_string();
        assert!(validate_settings(&settings).is_err());

        settings.logging.level = "debug,sqlx=warn".to_string();
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_memory_backend_skips_database_url() {
        let mut settings = Settings::for_testing();
        settings.database.url = String::new();
        assert!(validate_settings(&settings).is_ok());
    }
}
