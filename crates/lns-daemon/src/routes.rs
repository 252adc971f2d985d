//! Axum router and HTTP handlers for lns-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers so tests can drive the bare router.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::{
    api_types::{ErrorResponse, HealthResponse, ImportAcceptedResponse, ImportStatisticsResponse},
    state::{AppState, BusMsg},
};

/// Window for the "imported in the last 24h" counter.
const RECENT_WINDOW_HOURS: i64 = 24;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/import/start", post(import_start))
        .route("/v1/import/subject/:id", post(import_subject))
        .route("/v1/import/statistics", get(import_statistics))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.clone(),
            version: st.build.version.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.snapshot().await))
}

// ---------------------------------------------------------------------------
// POST /v1/import/start
// ---------------------------------------------------------------------------

pub(crate) async fn import_start(State(st): State<Arc<AppState>>) -> Response {
    match st.try_start_run() {
        Ok(()) => {
            info!("import run accepted");
            (
                StatusCode::ACCEPTED,
                Json(ImportAcceptedResponse { accepted: true }),
            )
                .into_response()
        }
        Err(e) => (StatusCode::CONFLICT, Json(ErrorResponse::new(e.to_string()))).into_response(),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/import/subject/:id
// ---------------------------------------------------------------------------

pub(crate) async fn import_subject(
    State(st): State<Arc<AppState>>,
    Path(subject_id): Path<i64>,
) -> Response {
    match st.run_subject(subject_id).await {
        Ok(report) => {
            let not_found = report
                .statistics
                .detail
                .errors_by_kind
                .contains_key("subject_not_found");
            let code = if not_found {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::OK
            };
            (code, Json(report)).into_response()
        }
        Err(e) => (StatusCode::CONFLICT, Json(ErrorResponse::new(e.to_string()))).into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/import/statistics
// ---------------------------------------------------------------------------

pub(crate) async fn import_statistics(State(st): State<Arc<AppState>>) -> Response {
    let since =
        chrono::Local::now().naive_local() - chrono::Duration::hours(RECENT_WINDOW_HOURS);
    match st.store.import_summary(since).await {
        Ok(summary) => {
            let body = ImportStatisticsResponse {
                progress: summary.progress(),
                summary,
                last_run: st.last_report().await,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "import summary query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(format!("import summary failed: {e}"))),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let events = broadcast_to_sse(st.bus.subscribe());
    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
