//! In-process fake of the platform backend for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use lessoncache_core::auth::SessionData;
use lessoncache_core::{ApiClient, SessionStore};

#[derive(Default)]
pub struct Backend {
    hits: Mutex<HashMap<&'static str, usize>>,
    bodies: Mutex<HashMap<&'static str, Vec<Value>>>,
    auth_headers: Mutex<Vec<String>>,
}

impl Backend {
    fn record(&self, route: &'static str, headers: &HeaderMap, body: Option<Value>) {
        *self.hits.lock().expect("hits").entry(route).or_default() += 1;
        if let Some(body) = body {
            self.bodies.lock().expect("bodies").entry(route).or_default().push(body);
        }
        if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            self.auth_headers.lock().expect("auth").push(value.to_string());
        }
    }

    pub fn hits(&self, route: &str) -> usize {
        self.hits.lock().expect("hits").get(route).copied().unwrap_or(0)
    }

    pub fn bodies(&self, route: &str) -> Vec<Value> {
        self.bodies.lock().expect("bodies").get(route).cloned().unwrap_or_default()
    }

    pub fn auth_headers(&self) -> Vec<String> {
        self.auth_headers.lock().expect("auth").clone()
    }

    /// Poll until `route` has been hit `count` times or two seconds pass.
    pub async fn wait_for(&self, route: &str, count: usize) -> bool {
        for _ in 0..200 {
            if self.hits(route) >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

type Shared = State<Arc<Backend>>;

async fn categories(State(backend): Shared, headers: HeaderMap) -> Json<Value> {
    backend.record("categories", &headers, None);
    Json(json!([{
        "id": 3, "name": "Foundations", "description": "Start here", "icon": "book",
        "color": "#663399", "difficulty_level": "beginner", "order_index": 0,
        "lesson_count": 1, "completed_lessons": 0
    }]))
}

async fn lessons(State(backend): Shared, headers: HeaderMap, UrlPath(category_id): UrlPath<i64>) -> Json<Value> {
    backend.record("lessons", &headers, None);
    Json(json!([{
        "id": 42, "title": "Prompt basics", "description": "Clear instructions",
        "category_id": category_id, "difficulty_level": "beginner", "estimated_duration": 15,
        "order_index": 0, "progress_status": "in_progress"
    }]))
}

async fn lesson(State(backend): Shared, headers: HeaderMap, UrlPath(lesson_id): UrlPath<i64>) -> Json<Value> {
    backend.record("lesson", &headers, None);
    Json(json!({
        "id": lesson_id, "title": "Prompt basics", "description": "Clear instructions",
        "category_id": 3, "difficulty_level": "beginner", "estimated_duration": 15,
        "progress_status": "in_progress", "progress_percentage": 0.0,
        "content_sections": [
            {"id": 1, "section_type": "introduction", "order_index": 0, "title": "Intro", "content": "Welcome"},
            {"id": 2, "section_type": "practice_exercise", "order_index": 1, "title": "Exercise 1",
             "content": {"scenario": "Summarise a meeting"}},
            {"id": 3, "section_type": "content_block", "order_index": 2, "title": "Tips", "content": "Be specific"},
            {"id": 4, "section_type": "practice_exercise", "order_index": 3, "title": "Exercise 2",
             "content": {"scenario": "Draft an email"}}
        ]
    }))
}

async fn submit_exercise(State(backend): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let prompt = body["submitted_prompt"].as_str().unwrap_or_default().to_string();
    backend.record("submit_exercise", &headers, Some(body));
    let score = if prompt.contains("good") { 90 } else { 40 };
    Json(json!({"id": 1, "score": score, "feedback": "Scored"}))
}

async fn progress(State(backend): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    backend.record("progress", &headers, Some(body));
    Json(json!({"ok": true}))
}

async fn dashboard(State(backend): Shared, headers: HeaderMap) -> Json<Value> {
    backend.record("dashboard", &headers, None);
    Json(json!({"stats": {"lessons_completed": 1, "total_lessons": 4}}))
}

async fn profile(State(backend): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    backend.record("profile", &headers, Some(body));
    Json(json!({"ok": true}))
}

async fn practice_submit(State(backend): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    backend.record("practice_submit", &headers, Some(body));
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({"detail": "Prompt is too short to score"})),
    )
        .into_response()
}

async fn playground(State(backend): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    backend.record("playground", &headers, Some(body));
    let euro = "€".as_bytes();
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(b"Cost: ")),
        Ok(Bytes::copy_from_slice(&euro[..1])),
        Ok(Bytes::copy_from_slice(&euro[1..])),
        Ok(Bytes::from_static(b"5")),
    ];
    Body::from_stream(futures::stream::iter(chunks)).into_response()
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

/// Start the fake backend on an ephemeral port.
pub async fn spawn_backend() -> (SocketAddr, Arc<Backend>) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/_healthz", get(health))
        .route("/routes/lessons/categories", get(categories))
        .route("/routes/lessons/categories/{id}/lessons", get(lessons))
        .route("/routes/lesson-content/lessons/{id}", get(lesson))
        .route("/routes/lesson-content/exercises/submit", post(submit_exercise))
        .route("/routes/lessons/progress", post(progress))
        .route("/routes/dashboard/", get(dashboard))
        .route("/routes/practice/profile", post(profile))
        .route("/routes/practice/submit", post(practice_submit))
        .route("/routes/playground", post(playground))
        .with_state(Arc::clone(&backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake backend");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve fake backend");
    });
    (addr, backend)
}

pub fn api_client(addr: SocketAddr) -> ApiClient {
    ApiClient::new(&format!("http://{}", addr)).expect("api client")
}

pub fn signed_in_store(dir: &Path, user_id: &str) -> Arc<SessionStore> {
    let store = Arc::new(SessionStore::new(dir.to_path_buf()));
    store.sign_in(session(user_id)).expect("sign in");
    store
}

pub fn session(user_id: &str) -> SessionData {
    let mut data = SessionData::new(user_id, format!("token-{}", user_id));
    data.display_name = Some(format!("User {}", user_id));
    data.email = Some(format!("{}@example.com", user_id));
    data
}
