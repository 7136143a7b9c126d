//! Single-frame detection endpoints (/detect, /detect/objects)

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, api_error};
use crate::AppState;
use crate::models::{DetectionResult, ObjectDetectionResult};
use crate::services::detector::DetectError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/detect", post(detect_events))
        .route("/detect/objects", post(detect_objects))
}

#[derive(Debug, Deserialize)]
struct DetectRequest {
    /// Frame as a base64 data URI
    image: String,
    /// Optional audio transcript folded into the prompt
    #[serde(default)]
    transcript: Option<String>,
}

/// POST /detect - Analyze one frame for significant events
async fn detect_events(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DetectRequest>,
) -> Result<Json<DetectionResult>, ApiError> {
    let mut detector = state.detector.lock().await;
    let result = detector
        .detect_events(&req.image, req.transcript.as_deref())
        .await
        .map_err(detect_error)?;
    Ok(Json(result))
}

/// POST /detect/objects - Analyze one frame for labelled objects
async fn detect_objects(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DetectRequest>,
) -> Result<Json<ObjectDetectionResult>, ApiError> {
    let mut detector = state.detector.lock().await;
    let result = detector
        .detect_objects(&req.image)
        .await
        .map_err(detect_error)?;
    Ok(Json(result))
}

/// Map a detection failure onto a status plus user-facing message
pub(super) fn detect_error(err: DetectError) -> ApiError {
    let status = match &err {
        DetectError::EmptyImage | DetectError::MalformedImage => StatusCode::BAD_REQUEST,
        DetectError::Cooldown(_) => StatusCode::TOO_MANY_REQUESTS,
        DetectError::MalformedResponse | DetectError::Upstream(_) => StatusCode::BAD_GATEWAY,
    };
    if status == StatusCode::BAD_GATEWAY {
        eprintln!("[detect] Detection failed: {}", err);
    }
    api_error(status, err.to_string())
}
