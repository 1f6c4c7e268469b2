//! Admin user management, reservation management and reports

mod fixtures;
mod helpers;

use axum::http::StatusCode;
use chrono::{Datelike, Utc};
use helpers::*;
use serde_json::{json, Value};

async fn admin_user_id(app: &TestApp, admin: &str) -> String {
    app.get("/api/me", Some(admin)).await.json()["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_user_list_filters_and_pagination() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    for (name, age) in [("Ana", 22), ("Bruno", 34), ("Carmen", 51)] {
        app.register(json!({
            "name": name,
            "email": unique_email(name),
            "password": USER_PASSWORD,
            "age": age,
            "location": "Santiago",
        }))
        .await;
    }

    let all = app.get("/api/admin/users", Some(&admin)).await.json();
    assert_eq!(all["total"], 4);
    assert_eq!(all["page"], 1);

    let window = app
        .get("/api/admin/users?skip=2&limit=2&sort_by=name&sort_order=asc", Some(&admin))
        .await
        .json();
    assert_eq!(window["users"].as_array().unwrap().len(), 2);
    assert_eq!(window["page"], 2);
    assert_eq!(window["pages"], 2);

    let thirties = app
        .get("/api/admin/users?age_min=30&age_max=40", Some(&admin))
        .await
        .json();
    assert_eq!(thirties["total"], 1);
    assert_eq!(thirties["users"][0]["name"], "Bruno");

    let admins = app
        .get("/api/admin/users?status_filter=admin", Some(&admin))
        .await
        .json();
    assert_eq!(admins["total"], 1);
    assert_eq!(admins["users"][0]["status"], "admin");

    let bad_range = app
        .get("/api/admin/users?age_min=50&age_max=20", Some(&admin))
        .await;
    assert_eq!(bad_range.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_user_detail_includes_attendance() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let event = app.create_upcoming_event(&admin, "Detalle", 10).await;
    let (token, user) = app.register_visitor("Asidua").await;
    let reservation = app.reserve(&token, event["id"].as_str().unwrap()).await;
    app.post(
        &format!("/api/checkin/{}", reservation["id"].as_str().unwrap()),
        Some(&admin),
        json!({}),
    )
    .await;

    let detail = app
        .get(&format!("/api/admin/users/{}", user["id"].as_str().unwrap()), Some(&admin))
        .await
        .json();
    assert_eq!(detail["total_reservations"], 1);
    assert_eq!(detail["attended_events"], 1);
    assert_eq!(detail["attendance_rate"], 100.0);
    assert_eq!(detail["recent_reservations"].as_array().unwrap().len(), 1);

    let missing = app
        .get(&format!("/api/admin/users/{}", uuid::Uuid::new_v4()), Some(&admin))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.detail(), "User not found");
}

#[tokio::test]
async fn test_admin_creates_and_updates_users() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let email = unique_email("staff");

    let created = app
        .post(
            "/api/admin/users",
            Some(&admin),
            json!({ "name": "Personal", "email": email, "password": "staff123", "is_admin": true }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let created = created.json();
    assert_eq!(created["is_admin"], true);

    let id = created["id"].as_str().unwrap();
    let updated = app
        .put(
            &format!("/api/admin/users/{}", id),
            Some(&admin),
            json!({ "name": "Personal de sala", "age": 40, "password": "nueva123" }),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.json()["name"], "Personal de sala");

    app.login(&email, "nueva123").await;

    let bad_age = app
        .put(&format!("/api/admin/users/{}", id), Some(&admin), json!({ "age": 121 }))
        .await;
    assert_eq!(bad_age.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_admin_cannot_demote_or_delete_themselves() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let admin_id = admin_user_id(&app, &admin).await;

    let demote = app
        .put(
            &format!("/api/admin/users/{}", admin_id),
            Some(&admin),
            json!({ "is_admin": false }),
        )
        .await;
    assert_eq!(demote.status, StatusCode::BAD_REQUEST);

    let delete = app.delete(&format!("/api/admin/users/{}", admin_id), Some(&admin)).await;
    assert_eq!(delete.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_user_is_soft_and_cancels_reservations() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let event = app.create_upcoming_event(&admin, "Perdido", 10).await;
    let (token, user) = app.register_visitor("Saliente").await;
    let reservation = app.reserve(&token, event["id"].as_str().unwrap()).await;
    let user_id = user["id"].as_str().unwrap();

    let response = app.delete(&format!("/api/admin/users/{}", user_id), Some(&admin)).await;
    assert_eq!(response.status, StatusCode::OK);

    let deleted = app
        .get("/api/admin/users?status_filter=deleted", Some(&admin))
        .await
        .json();
    assert_eq!(deleted["total"], 1);
    assert_eq!(deleted["users"][0]["id"], user_id);

    let login = app
        .post(
            "/api/login",
            None,
            json!({ "email": user["email"], "password": USER_PASSWORD }),
        )
        .await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);

    let reservations = app
        .get("/api/admin/reservations?status_filter=cancelled", Some(&admin))
        .await
        .json();
    assert_eq!(reservations["total"], 1);
    assert_eq!(reservations["reservations"][0]["id"], reservation["id"]);

    let event = app
        .get(&format!("/api/events/{}", event["id"].as_str().unwrap()), None)
        .await
        .json();
    assert_eq!(event["available_spots"], 10);
}

#[tokio::test]
async fn test_bulk_user_actions_skip_the_caller() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let admin_id = admin_user_id(&app, &admin).await;
    let (_, first) = app.register_visitor("Primero").await;
    let (_, second) = app.register_visitor("Segundo").await;

    let promoted = app
        .post(
            "/api/admin/users/bulk-action",
            Some(&admin),
            json!({ "user_ids": [first["id"], second["id"]], "action": "make_admin" }),
        )
        .await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.json()["message"], "2 users promoted to admin");
    assert_eq!(promoted.json()["affected_count"], 2);

    let deactivated = app
        .post(
            "/api/admin/users/bulk-action",
            Some(&admin),
            json!({ "user_ids": [admin_id, first["id"]], "action": "deactivate" }),
        )
        .await
        .json();
    assert_eq!(deactivated["affected_count"], 1);

    let me = app.get("/api/me", Some(&admin)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["status"], "active");
}

#[tokio::test]
async fn test_bulk_import_creates_accounts() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let response = app
        .upload_csv(
            "/api/admin/users/bulk-import",
            &admin,
            "usuarios.csv",
            fixtures::USERS_CSV,
            Some("bienvenido1"),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    let result = response.json();
    assert_eq!(result["total_processed"], 2);
    assert_eq!(result["successful_imports"], 2);
    assert_eq!(result["failed_imports"], 0);
    assert_eq!(result["imported_users"][0]["email"], "ana.import@example.com");

    app.login("luis.import@example.com", "bienvenido1").await;

    let again = app
        .upload_csv(
            "/api/admin/users/bulk-import",
            &admin,
            "usuarios.csv",
            fixtures::USERS_CSV,
            None,
        )
        .await
        .json();
    assert_eq!(again["successful_imports"], 0);
    assert_eq!(again["duplicate_emails"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_bulk_import_accepts_spanish_headers() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let result = app
        .upload_csv(
            "/api/admin/users/bulk-import",
            &admin,
            "USUARIOS.CSV",
            fixtures::SPANISH_USERS_CSV,
            None,
        )
        .await
        .json();
    assert_eq!(result["successful_imports"], 1);

    let users = app
        .get("/api/admin/users?search=maria.import", Some(&admin))
        .await
        .json();
    assert_eq!(users["users"][0]["location"], "La Romana");
    assert_eq!(users["users"][0]["age"], 35);
}

#[tokio::test]
async fn test_bulk_import_reports_row_errors() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let result = app
        .upload_csv(
            "/api/admin/users/bulk-import",
            &admin,
            "mixto.csv",
            fixtures::MIXED_USERS_CSV,
            None,
        )
        .await
        .json();
    assert_eq!(result["total_processed"], 4);
    assert_eq!(result["successful_imports"], 1);
    assert_eq!(result["failed_imports"], 3);
    assert_eq!(result["duplicate_emails"], json!(["carmen.import@example.com"]));

    let errors: Vec<&str> = result["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e.as_str().unwrap())
        .collect();
    assert_eq!(errors, vec!["Row 4: Invalid email address", "Row 5: invalid age 'abc'"]);
}

#[tokio::test]
async fn test_bulk_import_rejections() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let not_csv = app
        .upload_csv("/api/admin/users/bulk-import", &admin, "users.txt", fixtures::USERS_CSV, None)
        .await;
    assert_eq!(not_csv.status, StatusCode::BAD_REQUEST);
    assert_eq!(not_csv.detail(), "Only CSV files are supported");

    let missing = app
        .upload_csv(
            "/api/admin/users/bulk-import",
            &admin,
            "users.csv",
            fixtures::MISSING_COLUMNS_CSV,
            None,
        )
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.detail(), "CSV must contain 'name' and 'email' columns");

    let weak_password = app
        .upload_csv(
            "/api/admin/users/bulk-import",
            &admin,
            "users.csv",
            fixtures::USERS_CSV,
            Some("123"),
        )
        .await;
    assert_eq!(weak_password.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_bulk_import_rejects_latin1_files() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    // "teléfono" saved as ISO-8859-1
    let latin1: &[u8] = b"nombre,correo,tel\xe9fono\r\nAna,ana@example.com,8095550101\r\n";
    let response = app
        .upload_file("/api/admin/users/bulk-import", &admin, "usuarios.csv", latin1, None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.detail(), "CSV file must be UTF-8 encoded");

    let users = app.get("/api/admin/users", Some(&admin)).await.json();
    assert_eq!(users["total"], 1);
}

#[tokio::test]
async fn test_bulk_import_row_limit() {
    let mut settings = test_settings();
    settings.limits.max_users_per_import = 1;
    let app = TestApp::with_settings(settings);
    let admin = app.admin_token().await;

    let response = app
        .upload_csv("/api/admin/users/bulk-import", &admin, "users.csv", fixtures::USERS_CSV, None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_users_metrics() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.register_visitor("Activa").await;
    let (_, gone) = app.register_visitor("Borrada").await;
    app.delete(&format!("/api/admin/users/{}", gone["id"].as_str().unwrap()), Some(&admin))
        .await;

    let metrics = app.get("/api/admin/users-metrics", Some(&admin)).await.json();
    assert_eq!(metrics["total_users"], 2);
    assert_eq!(metrics["active_users"], 2);
    assert_eq!(metrics["admin_users"], 1);
    assert_eq!(metrics["deleted_users"], 1);
    assert_eq!(metrics["activity_rate"], 100.0);
}

/// Event with three reservations: one checked in, one cancelled, one confirmed
async fn seeded_event(app: &TestApp, admin: &str) -> (Value, Vec<Value>) {
    let event = app.create_upcoming_event(admin, "Reporte", 10).await;
    let event_id = event["id"].as_str().unwrap();

    let mut reservations = Vec::new();
    for name in ["Asistió", "Canceló", "Confirmó"] {
        let (token, _) = app.register_visitor(name).await;
        reservations.push(app.reserve(&token, event_id).await);
    }

    app.post(
        &format!("/api/admin/reservations/{}/checkin", reservations[0]["id"].as_str().unwrap()),
        Some(admin),
        json!({}),
    )
    .await;
    app.delete(
        &format!("/api/admin/reservations/{}", reservations[1]["id"].as_str().unwrap()),
        Some(admin),
    )
    .await;

    (event, reservations)
}

#[tokio::test]
async fn test_admin_reservation_list_and_metrics() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (event, _) = seeded_event(&app, &admin).await;

    let all = app.get("/api/admin/reservations", Some(&admin)).await.json();
    assert_eq!(all["total"], 3);
    assert!(all["reservations"][0]["user"]["name"].is_string());
    assert_eq!(all["reservations"][0]["event"]["title"], "Reporte");

    let by_event = app
        .get(
            &format!("/api/admin/reservations?event_filter={}", event["id"].as_str().unwrap()),
            Some(&admin),
        )
        .await
        .json();
    assert_eq!(by_event["total"], 3);

    let by_user = app
        .get("/api/admin/reservations?user_search=cancel", Some(&admin))
        .await
        .json();
    assert_eq!(by_user["total"], 1);
    assert_eq!(by_user["reservations"][0]["status"], "cancelled");

    let metrics = app.get("/api/admin/reservations/metrics", Some(&admin)).await.json();
    assert_eq!(metrics["total_reservations"], 3);
    assert_eq!(metrics["checked_in_reservations"], 1);
    assert_eq!(metrics["cancelled_reservations"], 1);
    assert_eq!(metrics["confirmed_reservations"], 1);
    assert_eq!(metrics["today_reservations"], 3);
}

#[tokio::test]
async fn test_bulk_reservation_checkin() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (_, reservations) = seeded_event(&app, &admin).await;
    let ids: Vec<&Value> = reservations.iter().map(|r| &r["id"]).collect();

    let result = app
        .post(
            "/api/admin/reservations/bulk-action",
            Some(&admin),
            json!({ "reservation_ids": ids, "action": "checkin" }),
        )
        .await;
    assert_eq!(result.status, StatusCode::OK);
    assert_eq!(result.json()["affected_count"], 1);
    assert_eq!(result.json()["message"], "1 reservations checked in");
}

#[tokio::test]
async fn test_reservation_export_formats() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    seeded_event(&app, &admin).await;

    let csv = app.get("/api/admin/reservations/export", Some(&admin)).await;
    assert_eq!(csv.status, StatusCode::OK);
    assert!(csv.header("content-type").unwrap().starts_with("text/csv"));
    assert!(csv.header("content-disposition").unwrap().contains("reservations_"));
    let body = csv.text();
    let mut lines = body.lines();
    assert!(lines.next().unwrap().starts_with("reservation_id,checkin_code,status"));
    assert_eq!(lines.count(), 3);

    let json = app
        .get("/api/admin/reservations/export?format=json", Some(&admin))
        .await
        .json();
    assert_eq!(json.as_array().unwrap().len(), 3);

    let excel = app
        .get("/api/admin/reservations/export?format=excel", Some(&admin))
        .await;
    assert_eq!(excel.status, StatusCode::BAD_REQUEST);
    assert_eq!(excel.detail(), "Unsupported export format");
}

#[tokio::test]
async fn test_event_attendance_report() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (event, _) = seeded_event(&app, &admin).await;
    let event_id = event["id"].as_str().unwrap();

    let report = app
        .get(&format!("/api/admin/events/{}/attendance-report", event_id), Some(&admin))
        .await
        .json();
    assert_eq!(report["event"]["title"], "Reporte");
    assert_eq!(report["summary"]["total_reservations"], 3);
    assert_eq!(report["summary"]["total_attended"], 1);
    assert_eq!(report["summary"]["total_cancelled"], 1);
    assert_eq!(report["demographics"]["age_groups"]["26-35"], 2);
    assert_eq!(report["demographics"]["locations"]["Santo Domingo"], 2);
    assert_eq!(report["attendance_list"].as_array().unwrap().len(), 3);

    let csv = app
        .get(&format!("/api/admin/events/{}/attendance-report/csv", event_id), Some(&admin))
        .await;
    assert_eq!(csv.status, StatusCode::OK);
    assert!(csv.header("content-disposition").unwrap().contains("attendance_"));
    assert!(csv.text().starts_with("name,email,phone,age,location,checkin_code"));
}

#[tokio::test]
async fn test_attendance_summary_and_monthly_report() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    seeded_event(&app, &admin).await;

    let summary = app
        .get("/api/admin/reports/attendance-summary", Some(&admin))
        .await
        .json();
    assert_eq!(summary["summary"]["total_events"], 1);
    assert_eq!(summary["summary"]["total_attended"], 1);
    assert_eq!(summary["events"][0]["event_title"], "Reporte");

    let inverted = app
        .get(
            "/api/admin/reports/attendance-summary?date_from=2030-01-10&date_to=2030-01-01",
            Some(&admin),
        )
        .await;
    assert_eq!(inverted.status, StatusCode::UNPROCESSABLE_ENTITY);

    let today = Utc::now().date_naive();
    let monthly = app
        .get(
            &format!("/api/admin/reports/monthly?month={}&year={}", today.month(), today.year()),
            Some(&admin),
        )
        .await;
    assert_eq!(monthly.status, StatusCode::OK);
    assert_eq!(monthly.json()["period"], format!("{:04}-{:02}", today.year(), today.month()));

    let invalid = app
        .get("/api/admin/reports/monthly?month=13&year=2025", Some(&admin))
        .await;
    assert_eq!(invalid.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_admin_stats() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    seeded_event(&app, &admin).await;

    let stats = app.get("/api/admin/stats", Some(&admin)).await.json();
    assert_eq!(stats["total_events"], 1);
    // the cancelled reservation no longer counts
    assert_eq!(stats["total_reservations"], 2);
    assert_eq!(stats["total_checkins"], 1);
    assert_eq!(stats["total_users"], 4);
}
