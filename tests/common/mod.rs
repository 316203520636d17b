#![allow(dead_code)]

use axum_test::TestServer;
use dev_habit::auth::JwtValidator;
use dev_habit::infrastructure::cache::{NullCache, PgCache};
use dev_habit::infrastructure::crypto::EncryptionService;
use dev_habit::infrastructure::github::GitHubClient;
use dev_habit::routes::router;
use dev_habit::state::{AppState, Infrastructure, Repositories};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

pub const SECRET: &[u8] = b"integration-test-secret";
pub const ISSUER: &str = "http://localhost:9000/realms/dev-habit";
pub const AUDIENCE: &str = "dev-habit-api";

/// Signed token for `subject` holding the `member` role.
pub fn token(subject: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = json!({
        "sub": subject,
        "exp": now + 600,
        "iss": ISSUER,
        "aud": AUDIENCE,
        "email": format!("{subject}@example.com"),
        "name": "Test User",
        "realm_access": { "roles": ["member"] },
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

pub fn bearer(subject: &str) -> String {
    format!("Bearer {}", token(subject))
}

pub fn create_test_state(pool: PgPool) -> (AppState, mpsc::Receiver<String>) {
    let pool = Arc::new(pool);
    let (tx, rx) = mpsc::channel(100);

    let state = AppState::new(
        &Repositories::postgres(pool.clone()),
        Infrastructure {
            cache: Arc::new(NullCache::new()),
            idempotency: Arc::new(PgCache::new(pool, 60)),
            github: Arc::new(GitHubClient::new("http://127.0.0.1:9").unwrap()),
            encryption: EncryptionService::from_key_bytes(&[7u8; 32]).unwrap(),
            jwt: JwtValidator::with_hs256(SECRET, ISSUER, AUDIENCE, "public-client"),
        },
        tx,
        "http://localhost:5000",
        false,
    );

    (state, rx)
}

/// Full router over a fresh database, plus the state behind it.
pub fn make_server(pool: PgPool) -> (TestServer, AppState) {
    let (state, _rx) = create_test_state(pool);
    let server = TestServer::new(router(state.clone(), &[])).unwrap();
    (server, state)
}

pub fn habit_body(name: &str) -> Value {
    json!({
        "name": name,
        "description": "Every morning",
        "type": 2,
        "frequency": { "type": 1, "timesPerPeriod": 1 },
        "target": { "value": 30, "unit": "minutes" }
    })
}

/// Creates a habit through the API and returns its id.
pub async fn create_habit(server: &TestServer, subject: &str, name: &str) -> String {
    let response = server
        .post("/api/habits")
        .add_header("Authorization", bearer(subject))
        .json(&habit_body(name))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().to_string()
}

/// Creates a tag through the API and returns its id.
pub async fn create_tag(server: &TestServer, subject: &str, name: &str) -> String {
    let response = server
        .post("/api/tags")
        .add_header("Authorization", bearer(subject))
        .json(&json!({ "name": name }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().to_string()
}
