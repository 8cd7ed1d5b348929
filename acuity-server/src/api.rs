//! The `/api` route family: sessions, frames, game results, report.
//!
//! Responses follow the `{ok: true, ...}` envelope; failures answer
//! `{ok: false, error}` with 400 for validation problems and 500 for
//! storage problems. Unknown sessions on the frame/result ingest routes
//! are validation problems, not storage ones.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use acuity_core::report::assess;
use acuity_core::types::{Frame, FrameId, GameResult, Landmark, Session, SessionId};
use acuity_core::AcuityError;

use crate::state::SharedState;

/// The `/api` route family.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/frames", post(create_frame))
        .route("/api/games/result", post(record_result))
        .route("/api/games/report/{session_id}", get(session_report))
}

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn api_error(status: StatusCode, msg: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "ok": false, "error": msg })))
}

/// Map a storage error: a missing session is the caller's mistake,
/// everything else is ours.
fn store_error(err: AcuityError) -> (StatusCode, Json<Value>) {
    match err {
        AcuityError::SessionNotFound(_) => api_error(StatusCode::BAD_REQUEST, "Unknown session"),
        other => api_error(StatusCode::INTERNAL_SERVER_ERROR, &other.to_string()),
    }
}

fn parse_session_id(raw: &str) -> Result<SessionId, (StatusCode, Json<Value>)> {
    SessionId::parse(raw)
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, "Malformed session id"))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CreateSessionRequest {
    #[serde(default)]
    id: Option<SessionId>,
    #[serde(rename = "subjectId", default)]
    subject_id: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

async fn create_session(
    State(state): State<SharedState>,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult {
    let notes = req.notes.unwrap_or_default();
    let session = match req.id {
        Some(id) => Session::with_id(id, req.subject_id, notes),
        None => Session::new(req.subject_id, notes),
    };

    state
        .store
        .lock()
        .create_session(&session)
        .map_err(store_error)?;
    debug!(session = %session.id, "session created");
    Ok(Json(json!({ "ok": true, "session": session })))
}

async fn get_session(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult {
    let id = parse_session_id(&id)?;
    let session = state.store.lock().get_session(&id).map_err(store_error)?;
    Ok(Json(json!({ "ok": true, "session": session })))
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CreateFrameRequest {
    #[serde(rename = "sessionId", default)]
    session_id: Option<String>,
    #[serde(default)]
    landmarks: Option<Vec<Landmark>>,
    #[serde(rename = "imagePath", default)]
    image_path: Option<String>,
}

async fn create_frame(
    State(state): State<SharedState>,
    Json(req): Json<CreateFrameRequest>,
) -> ApiResult {
    let Some(raw_id) = req.session_id else {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing fields"));
    };
    let session_id = parse_session_id(&raw_id)?;

    let frame = Frame {
        id: FrameId::new(),
        session_id,
        timestamp: Utc::now(),
        landmarks: req.landmarks.unwrap_or_default(),
        image_path: req.image_path,
    };

    state.store.lock().insert_frame(&frame).map_err(store_error)?;
    Ok(Json(json!({ "ok": true, "frame": frame })))
}

// ---------------------------------------------------------------------------
// Game results and report
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct GameResultRequest {
    #[serde(rename = "sessionId", default)]
    session_id: Option<String>,
    #[serde(rename = "gameType", default)]
    game_type: Option<String>,
    #[serde(default)]
    result: Option<Value>,
}

async fn record_result(
    State(state): State<SharedState>,
    Json(req): Json<GameResultRequest>,
) -> ApiResult {
    let (Some(raw_id), Some(result)) = (req.session_id, req.result) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing fields"));
    };
    let session_id = parse_session_id(&raw_id)?;
    let game_type = req.game_type.unwrap_or_else(|| "reaction".to_string());

    let record = GameResult::new(session_id, game_type, result);
    state
        .store
        .lock()
        .insert_result(&record)
        .map_err(store_error)?;
    debug!(session = %session_id, game = %record.game_type, "game result stored");
    Ok(Json(json!({ "ok": true, "result": record })))
}

async fn session_report(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> ApiResult {
    let session_id = parse_session_id(&session_id)?;
    let report_config = &state.config.report;

    let (results, frames) = {
        let store = state.store.lock();
        let results = store
            .recent_results(&session_id, report_config.result_window)
            .map_err(store_error)?;
        let frames = store
            .recent_frames(&session_id, report_config.frame_window)
            .map_err(store_error)?;
        (results, frames)
    };

    let report = assess(&results, &frames, report_config);
    let frames_count = frames.len();
    Ok(Json(json!({
        "ok": true,
        "avgReaction": report.avg_reaction_ms,
        "faceScore": report.face_score,
        "risk": report.risk,
        "games": results,
        "framesCount": frames_count,
    })))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
