//! Test data helpers for building request payloads

use chrono::{Duration, Utc};
use fake::faker::name::en::Name;
use fake::Fake;
use serde_json::{json, Value};
use uuid::Uuid;

/// Email that never collides with another test's accounts
pub fn unique_email(hint: &str) -> String {
    let local: String = hint
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    format!("{}.{}@example.com", local, &Uuid::new_v4().simple().to_string()[..8])
}

/// Generated visitor registration payload
pub fn fake_registration() -> Value {
    let name: String = Name().fake();
    json!({
        "name": name,
        "email": unique_email(&name),
        "password": "secret123",
        "age": (18..70).fake::<i32>(),
        "location": "Santiago",
    })
}

/// Event payload dated `days_ahead` days from today (negative for the past)
pub fn event_payload(title: &str, days_ahead: i64, capacity: i32) -> Value {
    let date = Utc::now().date_naive() + Duration::days(days_ahead);
    json!({
        "title": title,
        "description": format!("{} en el Centro Cultural", title),
        "category": "Concerts",
        "date": date.format("%Y-%m-%d").to_string(),
        "time": "19:00",
        "capacity": capacity,
        "location": "Sala Principal",
        "price": 0.0,
        "tags": ["musica"],
    })
}
