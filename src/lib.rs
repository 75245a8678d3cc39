//! Procurement API Library
//!
//! Requirements (purchase requests), their line items, and the
//! submission/approval workflow, served over HTTP with axum.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{routing::get, Router};
use chrono::Utc;
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use utoipa::ToSchema;

use crate::auth::{AuthRouterExt, AuthService};
use crate::events::EventSender;
use crate::repositories::RequirementRepository;

// App state definition
#[derive(Clone)]
pub struct AppState {
    /// `None` when running on the in-memory store.
    pub db: Option<Arc<DatabaseConnection>>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        config: config::AppConfig,
        db: Option<Arc<DatabaseConnection>>,
        repository: Arc<dyn RequirementRepository>,
        event_sender: EventSender,
    ) -> Self {
        let settings = services::requirements::ServiceSettings::from(&config);
        let services = handlers::AppServices::new(repository, Arc::new(event_sender), settings);
        Self {
            db,
            config,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Authenticated `/api/v1` routes.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::requirements::requirement_routes())
        .with_auth()
}

/// Full application router with the HTTP middleware stack applied.
pub fn build_router(state: AppState, auth_service: Arc<AuthService>) -> Router {
    let cors_layer = cors_layer(&state.config);
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::<AppState>::new()
        .route("/", get(|| async { "procurement-api up" }))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/health", health::health_routes())
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        // Inject AuthService into request extensions for auth middleware
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
             mut req: axum::http::Request<axum::body::Body>,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        // Production configs are rejected at load time without explicit origins.
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
