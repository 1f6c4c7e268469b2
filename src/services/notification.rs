//! Notification service implementation
//!
//! Sends transactional emails (welcome, reservation, check-in, cancellation)
//! through the SendGrid v3 API. Messages are built from Spanish templates with
//! `{placeholder}` substitution. When no API key is configured, or the feature is
//! switched off, messages are logged and skipped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info};

use crate::config::EmailConfig;
use crate::models::{Event, Reservation, User};
use crate::utils::errors::{CulturalCenterError, Result};
use crate::utils::helpers::format_hhmm;
use crate::utils::logging::log_api_error;

pub const TEMPLATE_WELCOME: &str = "welcome";
pub const TEMPLATE_RESERVATION_CONFIRMED: &str = "reservation_confirmed";
pub const TEMPLATE_CHECKED_IN: &str = "checked_in";
pub const TEMPLATE_RESERVATION_CANCELLED: &str = "reservation_cancelled";

/// Email template with `{placeholder}` markers in subject and body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub key: String,
    pub subject: String,
    pub body: String,
}

/// Notification statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationStats {
    pub total_sent: u64,
    pub total_failed: u64,
    pub total_skipped: u64,
    pub sent_by_template: HashMap<String, u64>,
}

/// Outcome of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Skipped,
}

#[derive(Clone)]
pub struct NotificationService {
    client: reqwest::Client,
    config: EmailConfig,
    enabled: bool,
    templates: Arc<HashMap<String, MessageTemplate>>,
    stats: Arc<Mutex<NotificationStats>>,
}

impl NotificationService {
    /// Create a new NotificationService instance
    pub fn new(config: EmailConfig, enabled: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            enabled,
            templates: Arc::new(Self::load_default_templates()),
            stats: Arc::new(Mutex::new(NotificationStats::default())),
        })
    }

    /// Whether messages actually leave the process
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.config.sendgrid_api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Render a template into `(subject, body)`
    pub fn format_message(&self, template_key: &str, parameters: &HashMap<String, String>) -> Result<(String, String)> {
        let template = self
            .templates
            .get(template_key)
            .ok_or_else(|| CulturalCenterError::InvalidInput(format!("Template not found: {}", template_key)))?;

        let mut subject = template.subject.clone();
        let mut body = template.body.clone();
        for (key, value) in parameters {
            let placeholder = format!("{{{}}}", key);
            subject = subject.replace(&placeholder, value);
            body = body.replace(&placeholder, value);
        }

        Ok((subject, body))
    }

    /// Send a plain-text email through SendGrid
    pub async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<Delivery> {
        let Some(api_key) = self.config.sendgrid_api_key.as_deref().filter(|_| self.is_enabled()) else {
            info!(to = %to, subject = %subject, "Email notifications disabled, message skipped");
            self.record(None, false, true);
            return Ok(Delivery::Skipped);
        };

        let payload = json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": self.config.from_email, "name": self.config.from_name },
            "subject": subject,
            "content": [{ "type": "text/plain", "value": body }],
        });

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            log_api_error("sendgrid", status.as_str(), Some(&detail));
            return Err(CulturalCenterError::Email(format!("SendGrid returned {}: {}", status, detail)));
        }

        debug!(to = %to, status = %status, "Email accepted by SendGrid");
        Ok(Delivery::Sent)
    }

    /// Render and send a template, updating the statistics
    pub async fn send_template(&self, to: &str, template_key: &str, parameters: HashMap<String, String>) -> Result<Delivery> {
        let (subject, body) = self.format_message(template_key, &parameters)?;

        match self.send_email(to, &subject, &body).await {
            Ok(Delivery::Sent) => {
                self.record(Some(template_key), true, false);
                info!(to = %to, template_key = %template_key, "Notification sent successfully");
                Ok(Delivery::Sent)
            }
            Ok(Delivery::Skipped) => Ok(Delivery::Skipped),
            Err(e) => {
                self.record(Some(template_key), false, false);
                error!(to = %to, template_key = %template_key, error = %e, "Failed to send notification");
                Err(e)
            }
        }
    }

    /// Send in a background task; failures are only logged
    pub fn dispatch(&self, to: String, template_key: &'static str, parameters: HashMap<String, String>) {
        let service = self.clone();
        tokio::spawn(async move {
            let _ = service.send_template(&to, template_key, parameters).await;
        });
    }

    pub fn notify_welcome(&self, user: &User) {
        let parameters = HashMap::from([("name".to_string(), user.name.clone())]);
        self.dispatch(user.email.clone(), TEMPLATE_WELCOME, parameters);
    }

    pub fn notify_reservation_confirmed(&self, user: &User, event: &Event, reservation: &Reservation) {
        let mut parameters = Self::event_parameters(user, event);
        parameters.insert("checkin_code".to_string(), reservation.checkin_code.clone());
        self.dispatch(user.email.clone(), TEMPLATE_RESERVATION_CONFIRMED, parameters);
    }

    pub fn notify_checked_in(&self, user: &User, event: &Event) {
        self.dispatch(user.email.clone(), TEMPLATE_CHECKED_IN, Self::event_parameters(user, event));
    }

    pub fn notify_cancelled(&self, user: &User, event: &Event) {
        self.dispatch(user.email.clone(), TEMPLATE_RESERVATION_CANCELLED, Self::event_parameters(user, event));
    }

    fn event_parameters(user: &User, event: &Event) -> HashMap<String, String> {
        HashMap::from([
            ("name".to_string(), user.name.clone()),
            ("event_title".to_string(), event.title.clone()),
            ("event_date".to_string(), event.date.format("%d/%m/%Y").to_string()),
            ("event_time".to_string(), format_hhmm(event.time)),
            ("event_location".to_string(), event.location.clone()),
        ])
    }

    fn record(&self, template_key: Option<&str>, sent: bool, skipped: bool) {
        let Ok(mut stats) = self.stats.lock() else {
            return;
        };
        if skipped {
            stats.total_skipped += 1;
        } else if sent {
            stats.total_sent += 1;
            if let Some(key) = template_key {
                *stats.sent_by_template.entry(key.to_string()).or_insert(0) += 1;
            }
        } else {
            stats.total_failed += 1;
        }
    }

    /// Get notification statistics
    pub fn stats(&self) -> NotificationStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Load default message templates
    fn load_default_templates() -> HashMap<String, MessageTemplate> {
        let templates = [
            MessageTemplate {
                key: TEMPLATE_WELCOME.to_string(),
                subject: "Bienvenido al Centro Cultural Banreservas".to_string(),
                body: "Hola {name},\n\nTu cuenta ha sido creada. Ya puedes explorar nuestra cartelera y reservar tu lugar en los próximos eventos.\n\nCentro Cultural Banreservas".to_string(),
            },
            MessageTemplate {
                key: TEMPLATE_RESERVATION_CONFIRMED.to_string(),
                subject: "Reserva confirmada: {event_title}".to_string(),
                body: "Hola {name},\n\nTu reserva para {event_title} está confirmada.\n\nFecha: {event_date}\nHora: {event_time}\nLugar: {event_location}\n\nCódigo de entrada: {checkin_code}\n\nPresenta este código o tu QR al llegar.\n\nCentro Cultural Banreservas".to_string(),
            },
            MessageTemplate {
                key: TEMPLATE_CHECKED_IN.to_string(),
                subject: "Bienvenido a {event_title}".to_string(),
                body: "Hola {name},\n\nRegistramos tu llegada a {event_title}. ¡Disfruta el evento!\n\nCentro Cultural Banreservas".to_string(),
            },
            MessageTemplate {
                key: TEMPLATE_RESERVATION_CANCELLED.to_string(),
                subject: "Reserva cancelada: {event_title}".to_string(),
                body: "Hola {name},\n\nTu reserva para {event_title} del {event_date} a las {event_time} ha sido cancelada.\n\nCentro Cultural Banreservas".to_string(),
            },
        ];

        templates.into_iter().map(|t| (t.key.clone(), t)).collect()
    }
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService")
            .field("enabled", &self.is_enabled())
            .field("api_url", &self.config.api_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(key: Option<&str>) -> NotificationService {
        let config = EmailConfig {
            sendgrid_api_key: key.map(str::to_string),
            ..EmailConfig::default()
        };
        NotificationService::new(config, true).unwrap()
    }

    #[test]
    fn test_format_message() {
        let service = service(None);
        let parameters = HashMap::from([
            ("name".to_string(), "Ana".to_string()),
            ("event_title".to_string(), "Jazz en el patio".to_string()),
        ]);

        let (subject, body) = service.format_message(TEMPLATE_CHECKED_IN, &parameters).unwrap();
        assert_eq!(subject, "Bienvenido a Jazz en el patio");
        assert!(body.contains("Hola Ana"));
    }

    #[test]
    fn test_unknown_template_is_rejected() {
        let service = service(None);
        assert!(service.format_message("missing", &HashMap::new()).is_err());
    }

    #[tokio::test]
    async fn test_send_without_key_is_skipped() {
        let service = service(None);
        assert!(!service.is_enabled());

        let parameters = HashMap::from([("name".to_string(), "Ana".to_string())]);
        let delivery = service.send_template("ana@example.com", TEMPLATE_WELCOME, parameters).await.unwrap();
        assert_eq!(delivery, Delivery::Skipped);
        assert_eq!(service.stats().total_skipped, 1);
    }
}
