//! Saved-session collection and statistics endpoints (/sessions, /stats)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::AppState;
use crate::models::{SavedSession, TimedEvent};
use crate::services::error::LogErr;
use crate::stats::{StatsOverview, build_overview};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(list_sessions).post(save_session))
        .route("/sessions/{id}", get(get_session))
        .route("/stats", get(get_stats))
}

/// GET /sessions - The whole saved collection, oldest first
async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SavedSession>>, StatusCode> {
    let sessions = state
        .sessions
        .load_all()
        .await
        .log_500("[sessions] Load failed")?;
    Ok(Json(sessions))
}

#[derive(Debug, Deserialize)]
struct SaveSessionRequest {
    name: String,
    #[serde(rename = "mediaReference")]
    media_reference: String,
    #[serde(default, rename = "thumbnailReference")]
    thumbnail_reference: String,
    timestamps: Vec<TimedEvent>,
}

/// POST /sessions - Append a session to the collection
async fn save_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveSessionRequest>,
) -> Result<(StatusCode, Json<SavedSession>), StatusCode> {
    if req.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let session = state
        .sessions
        .save(
            req.name.trim(),
            &req.media_reference,
            &req.thumbnail_reference,
            req.timestamps,
        )
        .await
        .log_500("[sessions] Save failed")?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /sessions/:id - One saved session
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SavedSession>, StatusCode> {
    let session = state
        .sessions
        .find(&id)
        .await
        .log_500("[sessions] Lookup failed")?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(session))
}

/// GET /stats - Aggregates over the saved collection
async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsOverview>, StatusCode> {
    let sessions = state
        .sessions
        .load_all()
        .await
        .log_500("[stats] Load failed")?;
    Ok(Json(build_overview(&sessions)))
}
