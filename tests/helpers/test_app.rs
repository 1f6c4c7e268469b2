//! In-memory application harness
//!
//! Builds the full router over the in-memory store and drives it with
//! `tower::ServiceExt::oneshot`, so no socket or database is needed.

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use cultural_center::{build_router, AppState, Settings};

use super::test_data::{event_payload, unique_email};

pub const ADMIN_EMAIL: &str = "admin@culturalcenter.com";
pub const ADMIN_PASSWORD: &str = "admin123";
pub const USER_PASSWORD: &str = "secret123";

/// Captured response of one request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "response body is not JSON ({}): {}",
                e,
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn detail(&self) -> String {
        self.json()["detail"].as_str().unwrap_or_default().to_string()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Settings every integration test starts from
pub fn test_settings() -> Settings {
    let mut settings = Settings::for_testing();
    settings.auth.admin_email = ADMIN_EMAIL.to_string();
    settings.auth.admin_password = ADMIN_PASSWORD.to_string();
    settings
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let state = AppState::in_memory(settings).expect("in-memory state builds");
        let router = build_router(state.clone());
        Self { state, router }
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request builds");

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("body collects")
            .to_bytes()
            .to_vec();
        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Multipart upload with a CSV `file` part and optional `default_password`
    pub async fn upload_csv(
        &self,
        uri: &str,
        token: &str,
        filename: &str,
        content: &str,
        default_password: Option<&str>,
    ) -> TestResponse {
        self.upload_file(uri, token, filename, content.as_bytes(), default_password)
            .await
    }

    /// Same as `upload_csv` for raw bytes in any encoding
    pub async fn upload_file(
        &self,
        uri: &str,
        token: &str,
        filename: &str,
        content: &[u8],
        default_password: Option<&str>,
    ) -> TestResponse {
        let boundary = "----cultural-center-test-boundary";
        let mut body: Vec<u8> = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
        if let Some(password) = default_password {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(b"Content-Disposition: form-data; name=\"default_password\"\r\n\r\n");
            body.extend_from_slice(password.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .expect("request builds");
        self.send(request).await
    }

    /// Ensure the configured admin exists and return a token for it
    pub async fn admin_token(&self) -> String {
        self.state
            .services
            .auth_service
            .ensure_admin_account()
            .await
            .expect("admin account");
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .post("/api/login", None, json!({ "email": email, "password": password }))
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.text());
        response.json()["access_token"]
            .as_str()
            .expect("access token")
            .to_string()
    }

    /// Register a visitor; returns `(token, user json)`
    pub async fn register(&self, payload: Value) -> (String, Value) {
        let response = self.post("/api/register", None, payload).await;
        assert_eq!(response.status, StatusCode::CREATED, "register failed: {}", response.text());
        let body = response.json();
        let token = body["access_token"].as_str().expect("access token").to_string();
        (token, body["user"].clone())
    }

    pub async fn register_visitor(&self, name: &str) -> (String, Value) {
        self.register(json!({
            "name": name,
            "email": unique_email(name),
            "password": USER_PASSWORD,
            "phone": "809-555-0101",
            "age": 30,
            "location": "Santo Domingo",
        }))
        .await
    }

    /// Create an event as admin; returns the event json
    pub async fn create_event(&self, admin_token: &str, payload: Value) -> Value {
        let response = self.post("/api/events", Some(admin_token), payload).await;
        assert_eq!(response.status, StatusCode::CREATED, "create event failed: {}", response.text());
        response.json()
    }

    pub async fn create_upcoming_event(&self, admin_token: &str, title: &str, capacity: i32) -> Value {
        self.create_event(admin_token, event_payload(title, 7, capacity)).await
    }

    /// Reserve a seat; returns the reservation json
    pub async fn reserve(&self, token: &str, event_id: &str) -> Value {
        let response = self
            .post("/api/reservations", Some(token), json!({ "event_id": event_id }))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "reservation failed: {}", response.text());
        response.json()
    }
}
