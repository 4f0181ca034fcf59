//! Read-only HTTP surface over the health cache.
//!
//! External probes consume four endpoints: an aggregate health verdict, the
//! full status snapshot, the current scrape configuration, and the
//! control-plane readiness flag.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cache::{HealthCache, StatusValue};
use crate::scrape::WatchedResource;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<HealthCache>,
    pub ready: Arc<AtomicBool>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck/v1/health", get(health))
        .route("/healthcheck/v1/status", get(status_report))
        .route("/healthcheck/v1/scrape_configuration", get(scrape_configuration))
        .route("/healthcheck/v1/ready", get(ready_probe))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Coarse verdict: healthy only while no live status entry exists.
async fn health(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.cache.count_live() >= 1 {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ok")
    } else {
        (StatusCode::OK, "ok")
    }
}

async fn status_report(State(state): State<AppState>) -> Json<BTreeMap<String, StatusValue>> {
    Json(state.cache.snapshot())
}

async fn scrape_configuration(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, Vec<WatchedResource>>> {
    Json(state.cache.dump_config())
}

async fn ready_probe(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.ready.load(Ordering::Relaxed) {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ok")
    }
}
