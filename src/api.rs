// src/api.rs
//! Admin surface: health/status, run trigger, source list and prompt edits.
//! Handlers only touch the stores or hand off to the scheduler; none of them
//! waits for a run.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::config::store::ConfigStore;
use crate::engine::Trigger;
use crate::error::StorageError;
use crate::history::HistoryEntry;
use crate::ingest::ledger::DedupLedger;
use crate::scheduler::{Scheduler, SchedulerState};

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Scheduler,
    pub config: Arc<ConfigStore>,
    pub ledger: Arc<DedupLedger>,
    /// Used by `POST /run` when the body names no target.
    pub default_target: Option<String>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/run", post(run_now))
        .route("/sources", get(list_sources).put(replace_sources))
        .route("/sources/{name}", post(add_source).delete(remove_source))
        .route("/prompt", get(get_prompt).put(set_prompt))
        .with_state(state)
}

struct ApiError(StatusCode, String);

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        let code = match e {
            StorageError::Invalid(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if code.is_server_error() {
            tracing::error!(error = %e, "config persist failed, in-memory value kept");
        }
        ApiError(code, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

#[derive(Serialize)]
struct StatusOut {
    state: SchedulerState,
    in_flight: usize,
    sources: Vec<String>,
    seen_items: usize,
    recent_runs: Vec<HistoryEntry>,
}

async fn status(State(state): State<AppState>) -> Json<StatusOut> {
    Json(StatusOut {
        state: state.scheduler.state(),
        in_flight: state.scheduler.in_flight(),
        sources: state.config.sources(),
        seen_items: state.ledger.len(),
        recent_runs: state.scheduler.history().snapshot_last_n(10),
    })
}

#[derive(Deserialize, Default)]
struct RunReq {
    #[serde(default)]
    target: Option<String>,
}

#[derive(Serialize)]
struct RunAccepted {
    accepted: bool,
    target: String,
}

async fn run_now(State(state): State<AppState>, body: Bytes) -> Result<(StatusCode, Json<RunAccepted>), ApiError> {
    let req: RunReq = if body.iter().all(u8::is_ascii_whitespace) {
        RunReq::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError(StatusCode::BAD_REQUEST, format!("invalid body: {e}")))?
    };
    let target = req
        .target
        .filter(|t| !t.trim().is_empty())
        .or(state.default_target.clone())
        .ok_or_else(|| {
            ApiError(
                StatusCode::BAD_REQUEST,
                "no target given and PERSONAL_CHAT_ID is not set".into(),
            )
        })?;

    state.scheduler.trigger(target.clone(), Trigger::Manual);
    Ok((
        StatusCode::ACCEPTED,
        Json(RunAccepted {
            accepted: true,
            target,
        }),
    ))
}

async fn list_sources(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.config.sources())
}

async fn replace_sources(
    State(state): State<AppState>,
    Json(names): Json<Vec<String>>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.config.replace_sources(names)?))
}

#[derive(Serialize)]
struct Changed {
    changed: bool,
    sources: Vec<String>,
}

async fn add_source(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Changed>, ApiError> {
    let changed = state.config.add_source(&name)?;
    Ok(Json(Changed {
        changed,
        sources: state.config.sources(),
    }))
}

async fn remove_source(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Changed>, ApiError> {
    let changed = state.config.remove_source(&name)?;
    Ok(Json(Changed {
        changed,
        sources: state.config.sources(),
    }))
}

async fn get_prompt(State(state): State<AppState>) -> String {
    state.config.prompt()
}

async fn set_prompt(State(state): State<AppState>, body: String) -> Result<StatusCode, ApiError> {
    state.config.set_prompt(&body)?;
    Ok(StatusCode::NO_CONTENT)
}
