//! Event catalogue, scheduling and event administration

mod helpers;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use helpers::*;
use serde_json::json;

#[tokio::test]
async fn test_create_and_fetch_event() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let event = app.create_upcoming_event(&admin, "Noche de Jazz", 50).await;
    assert_eq!(event["title"], "Noche de Jazz");
    assert_eq!(event["time"], "19:00");
    assert_eq!(event["published"], true);
    assert_eq!(event["available_spots"], 50);
    assert_eq!(event["reserved_count"], 0);

    let id = event["id"].as_str().unwrap();
    let fetched = app.get(&format!("/api/events/{}", id), None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json()["id"], id);
}

#[tokio::test]
async fn test_event_validation() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let mut zero_capacity = event_payload("Sin cupo", 3, 10);
    zero_capacity["capacity"] = json!(0);
    let response = app.post("/api/events", Some(&admin), zero_capacity).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.detail(), "Capacity must be at least 1");

    let mut bad_category = event_payload("Categoría rara", 3, 10);
    bad_category["category"] = json!("Circus");
    let response = app.post("/api/events", Some(&admin), bad_category).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.detail().starts_with("Invalid category 'Circus'"));

    let mut bad_time = event_payload("Hora rara", 3, 10);
    bad_time["time"] = json!("7pm");
    let response = app.post("/api/events", Some(&admin), bad_time).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_spanish_category_labels_are_accepted() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let mut payload = event_payload("Taller de grabado", 5, 20);
    payload["category"] = json!("Talleres");
    let event = app.create_event(&admin, payload).await;
    assert_eq!(event["category"], "Workshops");

    let listed = app.get("/api/events?category=Workshops", None).await.json();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unpublished_events_are_hidden_from_visitors() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let mut draft = event_payload("Borrador", 10, 30);
    draft["published"] = json!(false);
    let event = app.create_event(&admin, draft).await;
    let id = event["id"].as_str().unwrap();

    let public = app.get(&format!("/api/events/{}", id), None).await;
    assert_eq!(public.status, StatusCode::NOT_FOUND);
    assert_eq!(public.detail(), "Event not found");

    let list = app.get("/api/events", None).await.json();
    assert!(list.as_array().unwrap().is_empty());

    let admin_list = app
        .get("/api/events?include_unpublished=true", Some(&admin))
        .await
        .json();
    assert_eq!(admin_list.as_array().unwrap().len(), 1);

    let toggled = app
        .post(&format!("/api/events/{}/publish", id), Some(&admin), json!({}))
        .await;
    assert_eq!(toggled.status, StatusCode::OK);
    assert_eq!(toggled.json()["published"], true);
    assert_eq!(app.get(&format!("/api/events/{}", id), None).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_list_is_ordered_by_date_and_searchable() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    app.create_event(&admin, event_payload("Concierto tardío", 20, 10)).await;
    app.create_event(&admin, event_payload("Concierto temprano", 2, 10)).await;
    app.create_event(&admin, event_payload("Recital de poesía", 5, 10)).await;

    let list = app.get("/api/events", None).await.json();
    let titles: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Concierto temprano", "Recital de poesía", "Concierto tardío"]);

    let found = app.get("/api/events?search=poes", None).await.json();
    assert_eq!(found.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_capacity_cannot_drop_below_reservations() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let event = app.create_upcoming_event(&admin, "Cupo justo", 5).await;
    let id = event["id"].as_str().unwrap();

    for name in ["Uno", "Dos"] {
        let (token, _) = app.register_visitor(name).await;
        app.reserve(&token, id).await;
    }

    let response = app
        .put(&format!("/api/events/{}", id), Some(&admin), json!({ "capacity": 1 }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .put(&format!("/api/events/{}", id), Some(&admin), json!({ "capacity": 2, "title": "Cupo exacto" }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["title"], "Cupo exacto");
    assert_eq!(body["available_spots"], 0);
}

#[tokio::test]
async fn test_delete_event_removes_its_reservations() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let event = app.create_upcoming_event(&admin, "Efímero", 10).await;
    let id = event["id"].as_str().unwrap();

    let (token, _) = app.register_visitor("Asistente").await;
    let reservation = app.reserve(&token, id).await;

    let response = app.delete(&format!("/api/events/{}", id), Some(&admin)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["message"], "Event deleted successfully");

    assert_eq!(app.get(&format!("/api/events/{}", id), Some(&admin)).await.status, StatusCode::NOT_FOUND);
    let lookup = app
        .get(&format!("/api/reservations/{}", reservation["id"].as_str().unwrap()), Some(&token))
        .await;
    assert_eq!(lookup.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_category_endpoints() {
    let app = TestApp::new().await;

    let labels = app.get("/api/categories", None).await.json();
    assert_eq!(labels.as_array().unwrap().len(), 8);
    assert_eq!(labels[0], "Dominican Cinema");

    let options = app.get("/api/events/categories/list", None).await.json();
    let categories = options["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 8);
    assert_eq!(categories[0]["value"], "Dominican Cinema");
    assert_eq!(categories[0]["label_es"], "Cinema Dominicano");
}

#[tokio::test]
async fn test_event_reservations_are_paginated() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let event = app.create_upcoming_event(&admin, "Lleno", 10).await;
    let id = event["id"].as_str().unwrap();

    for name in ["Ana", "Beto", "Carla"] {
        let (token, _) = app.register_visitor(name).await;
        app.reserve(&token, id).await;
    }

    let page = app
        .get(&format!("/api/events/{}/reservations?skip=0&limit=2", id), Some(&admin))
        .await
        .json();
    assert_eq!(page["total"], 3);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["has_next"], true);
    assert_eq!(page["has_previous"], false);
    assert_eq!(page["items"][0]["user_name"], "Ana");

    let bad_limit = app
        .get(&format!("/api/events/{}/reservations?limit=500", id), Some(&admin))
        .await;
    assert_eq!(bad_limit.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_stats_overview() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    app.create_upcoming_event(&admin, "Publicado", 10).await;
    let mut draft = event_payload("Borrador", 4, 10);
    draft["published"] = json!(false);
    app.create_event(&admin, draft).await;

    let stats = app.get("/api/events/stats/overview", Some(&admin)).await.json();
    assert_eq!(stats["total_events"], 2);
    assert_eq!(stats["published_events"], 1);
    assert_eq!(stats["draft_events"], 1);
    assert_eq!(stats["by_category"]["Concerts"], 2);
}

#[tokio::test]
async fn test_schedule_marks_occupied_slots() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.create_event(&admin, event_payload("Función", 6, 10)).await;
    let date = (Utc::now().date_naive() + Duration::days(6)).format("%Y-%m-%d").to_string();

    let schedule = app.get(&format!("/api/events/schedule?date={}", date), None).await.json();
    assert_eq!(schedule["events"].as_array().unwrap().len(), 1);
    let slots = schedule["slots"].as_array().unwrap();
    assert_eq!(slots.first().unwrap()["time"], "09:00");
    let seven_pm = slots.iter().find(|s| s["time"] == "19:00").unwrap();
    assert_eq!(seven_pm["occupied"], true);

    let check = app
        .get(&format!("/api/events/schedule/check?date={}&time=19:00", date), None)
        .await
        .json();
    assert_eq!(check["occupied"], true);
    assert_eq!(check["occupied_by"][0]["title"], "Función");

    let free = app
        .get(&format!("/api/events/schedule/check?date={}&time=10:00", date), None)
        .await
        .json();
    assert_eq!(free["occupied"], false);
}
