use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, error, info};

use crate::state::app_state::AppState;
use crate::utils::conf_helper::get_cached_config;

#[derive(Serialize)]
pub struct HealthStatus {
    status: String,
    files: usize,
    signals: usize,
}

pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/health", get(health_check))
        .route("/info", get(info_check))
        .route("/stop", get(stop_process))
        .with_state(state)
}

async fn index_page() -> Response {
    fs::read_to_string("data/index.html")
        .await
        .map(Html)
        .map(IntoResponse::into_response)
        .unwrap_or_else(|e| {
            error!("Index.html read error: {}", e);
            StatusCode::NOT_FOUND.into_response()
        })
}

async fn info_check() -> Response {
    match get_cached_config() {
        Some(config) => {
            debug!("{} info requested", config.name);
            Json(config).into_response()
        }
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    let files = state.files.read().await.len();
    let signals = state.signals.read().await.len();
    Json(HealthStatus {
        status: "ok".to_owned(),
        files,
        signals,
    })
}

async fn stop_process() -> impl IntoResponse {
    info!("Stop endpoint called, shutting down process");

    // give the response and the log line a moment to flush
    tokio::spawn(async {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        std::process::exit(0);
    });

    StatusCode::OK
}
