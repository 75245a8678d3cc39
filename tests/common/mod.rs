#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use procurement_api::{
    auth::{AuthConfig, AuthService, Claims},
    config::AppConfig,
    db,
    events::{self, EventSender},
    repositories::{InMemoryRequirementRepository, RequirementRepository, SqlRequirementRepository},
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret-with-enough-entropy-42";

/// Helper harness for driving the full router over a fresh store.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Application backed by an in-memory SQLite database with migrations applied.
    pub async fn new() -> Self {
        let mut cfg = test_config("sqlite::memory:");
        // sqlite in-memory databases live per connection
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let repository: Arc<dyn RequirementRepository> =
            Arc::new(SqlRequirementRepository::new(db_arc.clone()));
        Self::build(cfg, Some(db_arc), repository)
    }

    /// Application backed by the in-process store.
    pub async fn in_memory() -> Self {
        let cfg = test_config("memory://");
        Self::build(cfg, None, Arc::new(InMemoryRequirementRepository::new()))
    }

    fn build(
        cfg: AppConfig,
        db: Option<Arc<sea_orm::DatabaseConnection>>,
        repository: Arc<dyn RequirementRepository>,
    ) -> Self {
        let (event_sender, event_rx) = EventSender::channel(cfg.event_channel_capacity);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::from(&cfg)));
        let state = AppState::new(cfg, db, repository, event_sender);
        let router = procurement_api::build_router(state.clone(), auth_service);

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request as `user` and returns the status with the decoded body.
    pub async fn call(
        &self,
        user: &TestUser,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, Some(&user.token)).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    /// Creates a requirement as `user` with the given items and returns its id.
    pub async fn create_requirement(&self, user: &TestUser, items: Value) -> String {
        let (status, body) = self
            .call(
                user,
                Method::POST,
                "/api/v1/requirements",
                Some(json!({
                    "title": "Laptops for new hires",
                    "priority": "high",
                    "costCenter": "ENG-1",
                    "items": items,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
        body["data"]["id"]
            .as_str()
            .expect("requirement id")
            .to_string()
    }

    /// Creates a requirement with one priced item and submits it.
    pub async fn submitted_requirement(&self, user: &TestUser) -> String {
        let id = self
            .create_requirement(
                user,
                json!([{ "name": "Laptop", "quantity": "1", "unitOfMeasure": "ea", "estimatedPrice": "1200.00" }]),
            )
            .await;
        let (status, body) = self
            .call(
                user,
                Method::PUT,
                &format!("/api/v1/requirements/{id}/submit"),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "submit failed: {body}");
        id
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// A caller identity with a signed token.
pub struct TestUser {
    pub id: String,
    pub token: String,
}

impl TestUser {
    pub fn new(role: &str) -> Self {
        Self::named(&format!("{}-{}", role, Uuid::new_v4()), Some(role))
    }

    pub fn named(id: &str, role: Option<&str>) -> Self {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: id.to_string(),
            name: Some(format!("{} (test)", id)),
            email: Some(format!("{}@example.com", id)),
            role: role.map(str::to_string),
            iat: now,
            exp: now + 3600,
            iss: None,
            aud: None,
            jti: Some(Uuid::new_v4().to_string()),
        };
        Self {
            id: id.to_string(),
            token: sign(&claims, JWT_SECRET),
        }
    }

    pub fn buyer() -> Self {
        Self::new("buyer")
    }

    pub fn supplier() -> Self {
        Self::new("supplier")
    }

    pub fn admin() -> Self {
        Self::new("administrator")
    }
}

pub fn sign(claims: &Claims, secret: &str) -> String {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encode access token")
}

pub fn test_config(database_url: &str) -> AppConfig {
    AppConfig::new(
        database_url.to_string(),
        JWT_SECRET.to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    )
}

pub async fn response_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Parses a decimal rendered either as a JSON string or number.
pub fn decimal(value: &Value) -> rust_decimal::Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not a decimal: {other}"),
    }
}
