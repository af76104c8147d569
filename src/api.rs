// src/api.rs
// HTTP surface: health/status projections of the engine plus a manual
// out-of-band trigger. No endpoint mutates dedup state directly.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::engine::{CycleOutcome, DetectionEngine};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DetectionEngine>,
    pub check_interval_secs: u64,
    pub notifier_count: usize,
    pub portal_configured: bool,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/ping", get(ping))
        .route("/status", get(status))
        .route("/run", post(manual_run))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn home() -> Json<Value> {
    Json(json!({
        "message": "TNP Monitor API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/": "This help message",
            "/health": "Health check endpoint",
            "/ping": "Simple ping endpoint",
            "/status": "Job status information",
            "/run": "Manually trigger a detection cycle (POST)",
            "/metrics": "Prometheus metrics"
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn ping() -> Json<Value> {
    Json(json!({
        "message": "pong",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let engine_status = state.engine.status();
    Json(json!({
        "job_status": engine_status,
        "scheduler": {
            "interval_secs": state.check_interval_secs,
        },
        "environment": {
            "notifier_count": state.notifier_count,
            "has_portal_credentials": state.portal_configured,
        }
    }))
}

/// Fire an out-of-band cycle. Returns immediately, reporting whether the
/// trigger was accepted or dropped by the engine's guard, exactly like a
/// scheduler tick would be. The check and the spawn are not atomic, but a
/// lost race only means the spawned trigger gets dropped by the guard itself.
async fn manual_run(State(state): State<AppState>) -> Json<Value> {
    if state.engine.status().is_running {
        return Json(json!({
            "message": "Cycle already running, trigger dropped",
            "accepted": false,
            "timestamp": Utc::now().to_rfc3339(),
        }));
    }
    let engine = state.engine.clone();
    tokio::spawn(async move {
        if let CycleOutcome::Failed(e) = engine.try_run().await {
            tracing::warn!(error = %e, "manually triggered cycle failed");
        }
    });
    Json(json!({
        "message": "Job triggered",
        "accepted": true,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
