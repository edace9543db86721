// tests/api_http.rs
//
// HTTP-level tests for the admin Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use reddit_digest::analyze::ai_adapter::MockService;
use reddit_digest::api::{self, AppState};
use reddit_digest::engine::RunSettings;
use reddit_digest::history::RunHistory;
use reddit_digest::ingest::providers::FixtureProvider;
use reddit_digest::notify::LogChannel;
use reddit_digest::{BatchSummarizer, ConfigStore, DedupLedger, Orchestrator, Scheduler, SourceFetcher};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router(dir: &tempfile::TempDir, default_target: Option<&str>) -> (Router, AppState) {
    let config = Arc::new(
        ConfigStore::load_or_init(dir.path().join("sources.toml"), dir.path().join("prompt.txt"))
            .unwrap(),
    );
    let ledger = Arc::new(DedupLedger::load(dir.path().join("seen.json")).unwrap());
    let orchestrator = Orchestrator::new(
        SourceFetcher::new(Arc::new(FixtureProvider::new()), ledger.clone()),
        BatchSummarizer::new(Arc::new(MockService::fixed("ok")), config.clone()),
        Arc::new(LogChannel::new(4096)),
        config.clone(),
    )
    .with_settings(RunSettings {
        fetch_limit: 5,
        delivery_delay: Duration::ZERO,
    });
    let state = AppState {
        scheduler: Scheduler::new(Arc::new(orchestrator), Arc::new(RunHistory::with_capacity(5))),
        config,
        ledger,
        default_target: default_target.map(str::to_string),
    };
    (api::create_router(state.clone()), state)
}

async fn send(app: Router, method: &str, uri: &str, body: Body) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body)
        .expect("build request");
    let resp = app.oneshot(req).await.expect("router responds");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, bytes.to_vec())
}

#[tokio::test]
async fn health_is_ok() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = test_router(&dir, None);
    let (status, body) = send(app, "GET", "/health", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}

#[tokio::test]
async fn run_is_accepted_without_waiting() {
    let dir = tempfile::tempdir().unwrap();
    let (app, state) = test_router(&dir, Some("chat-default"));

    let (status, body) = send(app.clone(), "POST", "/run", Body::empty()).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["target"], "chat-default");

    let (status, body) = send(
        app,
        "POST",
        "/run",
        Body::from(json!({ "target": "other" }).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["target"], "other");

    // both runs land in history eventually
    for _ in 0..100 {
        if state.scheduler.history().snapshot_last_n(10).len() == 2 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("runs did not finish");
}

#[tokio::test]
async fn run_without_any_target_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = test_router(&dir, None);
    let (status, _) = send(app, "POST", "/run", Body::empty()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sources_can_be_listed_edited_and_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let (app, state) = test_router(&dir, None);

    let (status, body) = send(app.clone(), "GET", "/sources", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let v: Vec<String> = serde_json::from_slice(&body).unwrap();
    assert_eq!(v, vec!["Python", "MachineLearning", "Programming"]);

    let (status, body) = send(app.clone(), "POST", "/sources/rust", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["changed"], true);

    let (status, _) = send(app.clone(), "DELETE", "/sources/Python", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        state.config.sources(),
        vec!["MachineLearning", "Programming", "rust"]
    );

    let (status, body) = send(
        app.clone(),
        "PUT",
        "/sources",
        Body::from(json!(["golang", "r/zig"]).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let v: Vec<String> = serde_json::from_slice(&body).unwrap();
    assert_eq!(v, vec!["golang", "zig"]);

    let (status, _) = send(app, "PUT", "/sources", Body::from("[]")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn prompt_roundtrips_through_http() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = test_router(&dir, None);

    let (status, _) = send(app.clone(), "PUT", "/prompt", Body::from("Only the best bits.")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(app.clone(), "GET", "/prompt", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "Only the best bits.");

    let (status, _) = send(app, "PUT", "/prompt", Body::from("   ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_reports_idle_state() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = test_router(&dir, None);
    let (status, body) = send(app, "GET", "/status", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["state"], "idle");
    assert_eq!(v["seen_items"], 0);
}
