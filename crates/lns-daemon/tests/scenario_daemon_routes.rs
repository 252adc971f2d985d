//! In-process scenario tests for the lns-daemon HTTP endpoints.
//!
//! The router is driven via `tower::ServiceExt::oneshot`; no socket is bound.
//! Collaborators are the in-memory store and the scripted source.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use lns_daemon::{routes, state::AppState};
use lns_db::MemStore;
use lns_testkit::{fast_config, note, subject, FakeSource};
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_state() -> (Arc<AppState>, Arc<MemStore>) {
    let store = Arc::new(MemStore::with_subjects([
        subject(1, &["c-1"]),
        subject(2, &["c-2"]),
    ]));
    let source = Arc::new(
        FakeSource::new()
            .with_records(
                "c-1",
                vec![
                    note("n-1", "first", "amy", "2024-02-02 09:00:00"),
                    note("n-2", "second", "amy", "2024-02-02 10:00:00"),
                ],
            )
            .with_records("c-2", vec![note("n-3", "third", "bob", "2024-02-02 09:00:00")]),
    );
    let st = AppState::new(source, store.clone(), fast_config()).unwrap();
    (Arc::new(st), store)
}

async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn post(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

/// Poll GET /v1/status until a report is present.
async fn wait_for_report(st: &Arc<AppState>) -> serde_json::Value {
    for _ in 0..200 {
        let (_, body) = call(routes::build_router(Arc::clone(st)), get("/v1/status")).await;
        let json = parse_json(body);
        if !json["last_report"].is_null() && json["state"] == "idle" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run did not finish");
}

// ---------------------------------------------------------------------------
// GET /v1/health, /v1/status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let (st, _) = make_state();
    let (status, body) = call(routes::build_router(st), get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "lns-daemon");
}

#[tokio::test]
async fn status_is_idle_before_any_run() {
    let (st, _) = make_state();
    let (status, body) = call(routes::build_router(st), get("/v1/status")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["state"], "idle");
    assert!(json["active_run_id"].is_null());
    assert!(json["last_report"].is_null());
}

// ---------------------------------------------------------------------------
// POST /v1/import/start
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_accepts_and_runs_to_completion() {
    let (st, store) = make_state();
    let (status, body) = call(routes::build_router(Arc::clone(&st)), post("/v1/import/start")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(parse_json(body)["accepted"], true);

    let json = wait_for_report(&st).await;
    assert_eq!(json["run_state"], "completed");
    assert_eq!(json["last_report"]["outcome"], "completed");
    assert_eq!(json["last_report"]["statistics"]["created"], 3);
    assert_eq!(store.records().await.len(), 3);
}

#[tokio::test]
async fn start_while_running_is_409() {
    let (st, _) = make_state();
    let _held = Arc::clone(&st.run_lock).try_lock_owned().unwrap();

    let (status, body) = call(routes::build_router(Arc::clone(&st)), post("/v1/import/start")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(parse_json(body)["error"]
        .as_str()
        .unwrap()
        .contains("in progress"));

    let (status, _) = call(routes::build_router(st), post("/v1/import/subject/1")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// POST /v1/import/subject/:id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subject_import_returns_report() {
    let (st, store) = make_state();
    let (status, body) = call(routes::build_router(st), post("/v1/import/subject/2")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["outcome"], "completed");
    assert_eq!(json["statistics"]["created"], 1);
    let records = store.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].subject_id, 2);
}

#[tokio::test]
async fn unknown_subject_is_404_with_failed_report() {
    let (st, _) = make_state();
    let (status, body) = call(routes::build_router(Arc::clone(&st)), post("/v1/import/subject/99")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse_json(body)["outcome"], "critically_failed");

    // The lock is released even though the run failed.
    assert!(!st.is_running());
}

// ---------------------------------------------------------------------------
// GET /v1/import/statistics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn statistics_report_store_summary_and_last_run() {
    let (st, _) = make_state();
    let (_, body) = call(routes::build_router(Arc::clone(&st)), get("/v1/import/statistics")).await;
    let json = parse_json(body);
    assert_eq!(json["summary"]["total_records"], 0);
    assert_eq!(json["progress"], 0.0);
    assert!(json["last_run"].is_null());

    let (status, _) = call(routes::build_router(Arc::clone(&st)), post("/v1/import/subject/1")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(routes::build_router(st), get("/v1/import/statistics")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["summary"]["total_records"], 2);
    assert_eq!(json["summary"]["imported_records"], 2);
    assert_eq!(json["progress"], 1.0);
    assert_eq!(json["last_run"]["statistics"]["created"], 2);
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_transitions_are_published_on_the_bus() {
    let (st, _) = make_state();
    let mut rx = st.bus.subscribe();
    st.run_subject(1).await.unwrap();

    let mut names = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        names.push(msg.event_name());
    }
    assert!(names.contains(&"transition"));
    assert_eq!(names.last(), Some(&"status"));
}
