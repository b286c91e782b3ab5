#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use promo_service::{
    config::AppConfig,
    db,
    entities::{promo_config, promo_program},
    message_queue::{InMemoryMessageQueue, MessageQueue},
    repositories::NewProgram,
    services::configs::CreateConfig,
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

/// Application wired against a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub queue: Arc<InMemoryMessageQueue>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.cors_allow_any_origin = true;
        cfg.consumer_enabled = false;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let queue = Arc::new(InMemoryMessageQueue::new());
        let shared_queue: Arc<dyn MessageQueue> = queue.clone();
        let state = AppState::new(Arc::new(pool), cfg, shared_queue);
        let router = promo_service::app_router(state.clone()).expect("router");

        Self {
            router,
            state,
            queue,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router response");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn seed_program(&self, code_key: &str, quota: i32) -> promo_program::Model {
        self.state
            .services
            .programs
            .create_program(NewProgram {
                code_key: code_key.to_string(),
                quota,
                period_start: window_start(),
                period_end: window_end(),
            })
            .await
            .expect("seed program")
    }

    pub async fn seed_config(
        &self,
        code_key: &str,
        quantity: i32,
        min_trx: Decimal,
        max_trx: Option<Decimal>,
        prosentase: Decimal,
    ) -> promo_config::Model {
        self.state
            .services
            .configs
            .create_config(CreateConfig {
                code_key: code_key.to_string(),
                quantity,
                min_trx,
                max_trx,
                prosentase,
            })
            .await
            .expect("seed config")
    }
}

pub fn window_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
}

pub fn window_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 31, 23, 59, 59).unwrap()
}

pub fn in_window() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 10, 0, 0, 0).unwrap()
}
