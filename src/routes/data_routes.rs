use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use bsig::{handle_ws_fetch, BsigReader, ReaderOptions, Section, SignalSource};

use crate::state::app_state::{unique_name, AppState, FileReader, LoadedFile, SignalInfo};

#[derive(Serialize)]
pub struct ReaderSummary {
    pub id: String,
    pub path: String,
    pub signals_count: usize,
    pub headers: Vec<String>,
}

#[derive(Serialize)]
pub struct ReaderHeaders {
    pub id: String,
    pub headers: Vec<String>,
}

#[derive(Deserialize, Debug)]
pub struct FileReadRequest {
    pub mode: String, // "online" | "offline"
    pub path: String,
}

#[derive(Serialize, Debug)]
pub struct FileReadResponse {
    pub id: String,
    pub name: String,
    pub path: String,
    pub source: String,
    pub headers: Option<Vec<String>>,
    pub desc: Option<String>,
    pub tags: Option<Vec<String>>,
    pub created_at: Option<String>,
    pub source_url: Option<String>,
}

/// Optional time window for `/fetch`, in the time signal's unit.
#[derive(Deserialize, Debug, Default)]
pub struct FetchQuery {
    pub start: Option<u64>,
    pub end: Option<u64>,
    #[serde(default)]
    pub relative: bool,
}

impl FetchQuery {
    fn section(&self) -> Option<Section> {
        match (self.start, self.end) {
            (None, None) => None,
            (start, end) => Some(Section::new(
                start.unwrap_or(0),
                end.unwrap_or(u64::MAX),
                self.relative,
            )),
        }
    }
}

pub fn data_routes(state: AppState) -> Router {
    Router::new()
        .route("/read-file", post(read_file))
        .route("/fetch/{signal}", get(ws_fetch))
        .route("/readers", get(list_readers))
        .route("/readers/{id}/headers", get(reader_headers))
        .with_state(state)
}

/// Columns a file exposes: scalar signals by name, array slots as `name[i]`.
fn exposed_sources(reader: &FileReader) -> Vec<SignalSource> {
    let mut sources = Vec::new();
    for sig in reader.signals() {
        if sig.array_length > 1 {
            sources.extend((0..sig.array_length as usize).map(|i| SignalSource::slot(&sig.name, i)));
        } else {
            sources.push(SignalSource::scalar(&sig.name));
        }
    }
    sources
}

async fn read_file(
    State(state): State<AppState>,
    Json(request): Json<FileReadRequest>,
) -> Response {
    debug!("Reading file: mode={}, path={}", request.mode, request.path);

    let options = ReaderOptions {
        case_sensitive: state.settings.case_sensitive,
    };
    let path = request.path.clone();
    let opened = tokio::task::spawn_blocking(move || BsigReader::open_with(&path, options)).await;

    let reader = match opened {
        Ok(Ok(r)) => Arc::new(r),
        Ok(Err(e)) => {
            error!("Failed to open file {}: {}", request.path, e);
            return (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response();
        }
        Err(e) => {
            error!("Open task for {} failed: {}", request.path, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let file_id = Uuid::new_v4();
    let mut exposed_headers = Vec::new();
    {
        let mut signals = state.signals.write().await;
        for source in exposed_sources(&reader) {
            let header = unique_name(&signals, &source.header());
            info!("Register signal: {} (original: {})", header, source.header());
            signals.insert(
                header.clone(),
                SignalInfo {
                    reader: reader.clone(),
                    file_id,
                    source,
                },
            );
            exposed_headers.push(header);
        }
    }

    let created_at = chrono::Utc::now().to_rfc3339();
    state.files.write().await.insert(
        file_id,
        LoadedFile {
            path: request.path.clone(),
            headers: exposed_headers.clone(),
            created_at: created_at.clone(),
        },
    );

    let file_name = std::path::Path::new(&request.path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());

    Json(FileReadResponse {
        id: file_id.to_string(),
        name: file_name,
        path: request.path.clone(),
        source: request.path,
        headers: Some(exposed_headers),
        desc: Some(format!("bsig v{}", reader.version() as u8)),
        tags: None,
        created_at: Some(created_at),
        source_url: None,
    })
    .into_response()
}

async fn ws_fetch(
    State(state): State<AppState>,
    Path(signal_name): Path<String>,
    Query(query): Query<FetchQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let signal_info = {
        let signals = state.signals.read().await;
        signals.get(&signal_name).cloned()
    };

    let Some(signal_info) = signal_info else {
        error!("Signal not found: {}", signal_name);
        return StatusCode::NOT_FOUND.into_response();
    };

    let time_signal = state.settings.time_signal.clone();
    let section = query.section();
    ws.on_upgrade(move |socket| {
        handle_ws_fetch(
            socket,
            signal_info.reader,
            signal_info.source,
            time_signal,
            section,
        )
    })
}

async fn list_readers(State(state): State<AppState>) -> impl IntoResponse {
    let files = state.files.read().await;
    let mut out: Vec<ReaderSummary> = files
        .iter()
        .map(|(id, file)| ReaderSummary {
            id: id.to_string(),
            path: file.path.clone(),
            signals_count: file.headers.len(),
            headers: file.headers.clone(),
        })
        .collect();
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Json(out)
}

async fn reader_headers(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&reader_id) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    // headers still registered for this file, in registration order
    let headers: Vec<String> = {
        let files = state.files.read().await;
        let signals = state.signals.read().await;
        match files.get(&id) {
            Some(file) => file
                .headers
                .iter()
                .filter(|h| signals.get(*h).is_some_and(|s| s.file_id == id))
                .cloned()
                .collect(),
            None => return StatusCode::NOT_FOUND.into_response(),
        }
    };

    Json(ReaderHeaders {
        id: reader_id,
        headers,
    })
    .into_response()
}
