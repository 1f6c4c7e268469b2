//! Reservations and door check-in

mod helpers;

use std::sync::Arc;

use axum::http::StatusCode;
use helpers::*;
use serde_json::json;

#[tokio::test]
async fn test_reservation_gets_code_and_qr_payload() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let event = app.create_upcoming_event(&admin, "Cine club", 10).await;
    let (token, user) = app.register_visitor("Lucía").await;

    let reservation = app.reserve(&token, event["id"].as_str().unwrap()).await;
    assert_eq!(reservation["status"], "confirmed");
    assert_eq!(reservation["user_id"], user["id"]);
    assert_eq!(reservation["event_title"], "Cine club");

    let code = reservation["checkin_code"].as_str().unwrap();
    assert_eq!(code.len(), 8);
    assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    assert_eq!(
        reservation["qr_payload"],
        format!("reservation:{}", reservation["id"].as_str().unwrap())
    );

    let event = app
        .get(&format!("/api/events/{}", event["id"].as_str().unwrap()), None)
        .await
        .json();
    assert_eq!(event["available_spots"], 9);
}

#[tokio::test]
async fn test_duplicate_reservation_is_rejected() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let event = app.create_upcoming_event(&admin, "Única vez", 10).await;
    let event_id = event["id"].as_str().unwrap();
    let (token, _) = app.register_visitor("Repetido").await;

    app.reserve(&token, event_id).await;
    let again = app
        .post("/api/reservations", Some(&token), json!({ "event_id": event_id }))
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.detail(), "You already have a reservation for this event");
}

#[tokio::test]
async fn test_full_event_rejects_reservations() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let event = app.create_upcoming_event(&admin, "Sala pequeña", 1).await;
    let event_id = event["id"].as_str().unwrap();

    let (first, _) = app.register_visitor("Primera").await;
    app.reserve(&first, event_id).await;

    let (second, _) = app.register_visitor("Segunda").await;
    let response = app
        .post("/api/reservations", Some(&second), json!({ "event_id": event_id }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.detail(), "Event is fully booked");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_never_oversell() {
    const CAPACITY: i32 = 3;
    const VISITORS: usize = 10;

    let app = Arc::new(TestApp::new().await);
    let admin = app.admin_token().await;
    let event = app.create_upcoming_event(&admin, "Aforo limitado", CAPACITY).await;
    let event_id = event["id"].as_str().unwrap().to_string();

    let mut tokens = Vec::with_capacity(VISITORS);
    for i in 0..VISITORS {
        let (token, _) = app.register_visitor(&format!("Visitante {}", i)).await;
        tokens.push(token);
    }

    let handles: Vec<_> = tokens
        .into_iter()
        .map(|token| {
            let app = Arc::clone(&app);
            let event_id = event_id.clone();
            tokio::spawn(async move {
                app.post("/api/reservations", Some(&token), json!({ "event_id": event_id }))
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        let response = handle.await.unwrap();
        match response.status {
            StatusCode::CREATED => created += 1,
            StatusCode::BAD_REQUEST => assert_eq!(response.detail(), "Event is fully booked"),
            other => panic!("unexpected status {}: {}", other, response.text()),
        }
    }
    assert_eq!(created, CAPACITY);

    let view = app.get(&format!("/api/events/{}", event_id), None).await.json();
    assert_eq!(view["available_spots"], 0);
}

#[tokio::test]
async fn test_past_and_unknown_events_cannot_be_reserved() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let past = app.create_event(&admin, event_payload("Ayer", -1, 10)).await;
    let (token, _) = app.register_visitor("Tarde").await;

    let response = app
        .post("/api/reservations", Some(&token), json!({ "event_id": past["id"] }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.detail(), "Cannot reserve a past event");

    let unknown = app
        .post(
            "/api/reservations",
            Some(&token),
            json!({ "event_id": uuid::Uuid::new_v4() }),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_per_user_reservation_limit() {
    let mut settings = test_settings();
    settings.limits.max_reservations_per_user = 2;
    let app = TestApp::with_settings(settings);
    let admin = app.admin_token().await;
    let (token, _) = app.register_visitor("Ávido").await;

    for title in ["Uno", "Dos"] {
        let event = app.create_upcoming_event(&admin, title, 10).await;
        app.reserve(&token, event["id"].as_str().unwrap()).await;
    }

    let third = app.create_upcoming_event(&admin, "Tres", 10).await;
    let response = app
        .post("/api/reservations", Some(&token), json!({ "event_id": third["id"] }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.detail(), "Reservation limit reached");
}

#[tokio::test]
async fn test_my_reservations_and_ownership() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let event = app.create_upcoming_event(&admin, "Mío", 10).await;
    let (owner, _) = app.register_visitor("Dueña").await;
    let (other, _) = app.register_visitor("Otro").await;

    let reservation = app.reserve(&owner, event["id"].as_str().unwrap()).await;
    let reservation_id = reservation["id"].as_str().unwrap();

    let mine = app.get("/api/reservations", Some(&owner)).await.json();
    let mine = mine.as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["reservation"]["id"], reservation_id);
    assert_eq!(mine[0]["event"]["title"], "Mío");

    let none = app.get("/api/reservations", Some(&other)).await.json();
    assert!(none.as_array().unwrap().is_empty());

    let foreign = app
        .get(&format!("/api/reservations/{}", reservation_id), Some(&other))
        .await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);

    let as_admin = app
        .get(&format!("/api/reservations/{}", reservation_id), Some(&admin))
        .await;
    assert_eq!(as_admin.status, StatusCode::OK);
}

#[tokio::test]
async fn test_cancel_frees_the_seat() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let event = app.create_upcoming_event(&admin, "Cancelable", 1).await;
    let event_id = event["id"].as_str().unwrap();
    let (token, _) = app.register_visitor("Indecisa").await;

    let reservation = app.reserve(&token, event_id).await;
    let reservation_id = reservation["id"].as_str().unwrap();

    let cancelled = app
        .put(&format!("/api/reservations/{}/cancel", reservation_id), Some(&token), json!({}))
        .await;
    assert_eq!(cancelled.status, StatusCode::OK);
    assert_eq!(cancelled.json()["status"], "cancelled");
    assert!(!cancelled.json()["cancelled_at"].is_null());

    let again = app
        .delete(&format!("/api/reservations/{}", reservation_id), Some(&token))
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.detail(), "Reservation is already cancelled");

    let filtered = app
        .get("/api/reservations?status_filter=cancelled", Some(&token))
        .await
        .json();
    assert_eq!(filtered.as_array().unwrap().len(), 1);

    let (someone_else, _) = app.register_visitor("Siguiente").await;
    app.reserve(&someone_else, event_id).await;
}

#[tokio::test]
async fn test_check_in_by_code_then_repeat_is_rejected() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let event = app.create_upcoming_event(&admin, "Puerta", 10).await;
    let (token, user) = app.register_visitor("Puntual").await;
    let reservation = app.reserve(&token, event["id"].as_str().unwrap()).await;
    let code = reservation["checkin_code"].as_str().unwrap().to_lowercase();

    let response = app
        .post("/api/checkin", Some(&admin), json!({ "identifier": code }))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    let body = response.json();
    assert_eq!(body["reservation_id"], reservation["id"]);
    assert_eq!(body["user_email"], user["email"]);
    assert_eq!(body["event_title"], "Puerta");

    let repeat = app
        .post("/api/checkin", Some(&admin), json!({ "identifier": code }))
        .await;
    assert_eq!(repeat.status, StatusCode::BAD_REQUEST);
    assert_eq!(repeat.detail(), "Already checked in");

    let listed = app.get("/api/reservations", Some(&token)).await.json();
    assert_eq!(listed[0]["reservation"]["status"], "checked_in");
}

#[tokio::test]
async fn test_check_in_by_qr_email_and_phone() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let event = app.create_upcoming_event(&admin, "Multiacceso", 10).await;
    let event_id = event["id"].as_str().unwrap();

    let (qr_token, _) = app.register_visitor("Qr").await;
    let qr_reservation = app.reserve(&qr_token, event_id).await;
    let by_qr = app
        .post(
            "/api/checkin",
            Some(&admin),
            json!({ "identifier": qr_reservation["qr_payload"] }),
        )
        .await;
    assert_eq!(by_qr.status, StatusCode::OK);

    let (email_token, email_user) = app.register_visitor("Correo").await;
    app.reserve(&email_token, event_id).await;
    let by_email = app
        .post(
            "/api/checkin",
            Some(&admin),
            json!({ "identifier": email_user["email"].as_str().unwrap().to_uppercase(), "event_id": event_id }),
        )
        .await;
    assert_eq!(by_email.status, StatusCode::OK);
    assert_eq!(by_email.json()["user_email"], email_user["email"]);

    let (phone_token, _) = app
        .register(json!({
            "name": "Teléfono",
            "email": unique_email("telefono"),
            "password": USER_PASSWORD,
            "phone": "(829) 555-7788",
        }))
        .await;
    app.reserve(&phone_token, event_id).await;
    let by_phone = app
        .post("/api/checkin", Some(&admin), json!({ "identifier": "829.555.7788" }))
        .await;
    assert_eq!(by_phone.status, StatusCode::OK);
    assert_eq!(by_phone.json()["user_name"], "Teléfono");
}

#[tokio::test]
async fn test_check_in_errors() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (visitor, _) = app.register_visitor("Curioso").await;

    let unknown = app
        .post("/api/checkin", Some(&admin), json!({ "identifier": "ZZZZ2222" }))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.detail(), "No valid reservation found for this identifier");

    let forbidden = app
        .post("/api/checkin", Some(&visitor), json!({ "identifier": "ZZZZ2222" }))
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_checked_in_reservation_needs_admin_to_cancel() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let event = app.create_upcoming_event(&admin, "Asistido", 10).await;
    let (token, _) = app.register_visitor("Presente").await;
    let reservation = app.reserve(&token, event["id"].as_str().unwrap()).await;
    let reservation_id = reservation["id"].as_str().unwrap();

    let checked = app
        .post(&format!("/api/checkin/{}", reservation_id), Some(&admin), json!({}))
        .await;
    assert_eq!(checked.status, StatusCode::OK);

    let by_owner = app
        .delete(&format!("/api/reservations/{}", reservation_id), Some(&token))
        .await;
    assert_eq!(by_owner.status, StatusCode::BAD_REQUEST);

    let by_admin = app
        .delete(&format!("/api/admin/reservations/{}", reservation_id), Some(&admin))
        .await;
    assert_eq!(by_admin.status, StatusCode::OK);
    assert_eq!(by_admin.json()["status"], "cancelled");

    let cancelled_checkin = app
        .post(&format!("/api/checkin/{}", reservation_id), Some(&admin), json!({}))
        .await;
    assert_eq!(cancelled_checkin.status, StatusCode::BAD_REQUEST);
    assert_eq!(cancelled_checkin.detail(), "Cannot check in to a cancelled reservation");
}

#[tokio::test]
async fn test_login_is_rate_limited_per_client() {
    let mut settings = test_settings();
    settings.rate_limit.enabled = true;
    settings.rate_limit.requests = 2;
    settings.rate_limit.period_seconds = 60;
    let app = TestApp::with_settings(settings);

    let attempt = json!({ "email": "nobody@example.com", "password": "secret123" });
    for _ in 0..2 {
        let response = app.post("/api/login", None, attempt.clone()).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    let limited = app.post("/api/login", None, attempt).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.detail(), "Too many requests");

    // unrelated routes are not limited
    assert_eq!(app.get("/api/categories", None).await.status, StatusCode::OK);
}
