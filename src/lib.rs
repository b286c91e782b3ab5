//! Promo service library
//!
//! Program and config administration, tier resolution, point computation and
//! quota tracking behind an axum HTTP API and a message queue consumer.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod consumers;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod message_queue;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{http::HeaderValue, routing::get, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};

pub use handlers::common::{ApiResponse, ApiResult, ResponseMeta};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub message_queue: Arc<dyn message_queue::MessageQueue>,
}

impl AppState {
    /// Builds the state with sea-orm repositories over `db`.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        message_queue: Arc<dyn message_queue::MessageQueue>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), &config.promo);
        Self {
            db,
            config,
            services,
            message_queue,
        }
    }
}

/// Promo endpoints, mounted under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::programs::program_routes())
        .merge(handlers::configs::config_routes())
        .merge(handlers::transactions::transaction_routes())
}

/// CORS policy from configuration. Fails when no origins are configured
/// outside development and permissive mode was not requested.
pub fn cors_layer(cfg: &config::AppConfig) -> Result<CorsLayer, errors::ServiceError> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any))
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        Ok(CorsLayer::permissive())
    } else {
        Err(errors::ServiceError::InternalError(
            "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
        ))
    }
}

/// Full HTTP application: health probes, the v1 API and Swagger UI, wrapped in
/// tracing, compression, CORS and request-id middleware.
pub fn app_router(state: AppState) -> Result<Router, errors::ServiceError> {
    let cors = cors_layer(&state.config)?;

    Ok(Router::<AppState>::new()
        .route("/", get(|| async { "promo-service up" }))
        .nest("/health", handlers::health::health_routes())
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state))
}

pub mod prelude {
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::services::*;
    pub use crate::tracing::*;
}
