//! Live monitor lifecycle endpoints (/monitor/*)

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{ApiError, api_error};
use crate::AppState;
use crate::capture::{MonitorMode, MonitorState, start_live_monitor};
use crate::constants::{LIVE_INTERVAL_SECS, OBJECT_INTERVAL_SECS};
use crate::models::{DetectedObject, TimedEvent};
use crate::sampler::LiveSource;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/monitor/start", post(start))
        .route("/monitor/stop", post(stop))
        .route("/monitor/events", get(events))
        .route("/monitor/transcript", post(append_transcript))
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    /// Stream URL; falls back to the configured default
    #[serde(default, rename = "sourceUrl")]
    source_url: Option<String>,
    /// Sampling period in seconds; defaults to 3s for events, 2s for objects
    #[serde(default, rename = "intervalSecs")]
    interval_secs: Option<u64>,
    /// "events" (default) or "objects"
    #[serde(default)]
    mode: Option<MonitorMode>,
}

#[derive(Debug, Serialize)]
struct MonitorStatus {
    state: MonitorState,
    events: Vec<TimedEvent>,
    objects: Vec<DetectedObject>,
}

/// POST /monitor/start - Arm the live capture loop
async fn start(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<MonitorStatus>, ApiError> {
    let url = req
        .source_url
        .or_else(|| state.stream_url.clone())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "no stream source configured"))?;

    let mode = req.mode.unwrap_or(MonitorMode::Events);
    let default_interval = match mode {
        MonitorMode::Events => LIVE_INTERVAL_SECS,
        MonitorMode::Objects => OBJECT_INTERVAL_SECS,
    };
    let period = Duration::from_secs(req.interval_secs.unwrap_or(default_interval).max(1));

    let mut slot = state.monitor.lock().await;
    if let Some(handle) = slot.as_ref() {
        if handle.state().await != MonitorState::Cancelled {
            return Err(api_error(
                StatusCode::CONFLICT,
                "a monitor is already running",
            ));
        }
    }

    println!(
        "[monitor] Starting live monitor on {} every {:?}",
        url, period
    );
    let handle = start_live_monitor(
        LiveSource::new(url),
        state.detector.clone(),
        state.alerts.clone(),
        period,
        mode,
    );
    let status = MonitorStatus {
        state: handle.state().await,
        events: Vec::new(),
        objects: Vec::new(),
    };
    *slot = Some(handle);

    Ok(Json(status))
}

/// POST /monitor/stop - Disarm the loop; returns everything it collected
async fn stop(State(state): State<Arc<AppState>>) -> Result<Json<MonitorStatus>, ApiError> {
    let slot = state.monitor.lock().await;
    let handle = slot
        .as_ref()
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "no monitor has been started"))?;

    handle.stop().await;
    Ok(Json(MonitorStatus {
        state: handle.state().await,
        events: handle.events().await,
        objects: handle.objects().await,
    }))
}

/// GET /monitor/events - Snapshot of the loop state and its events so far
async fn events(State(state): State<Arc<AppState>>) -> Result<Json<MonitorStatus>, ApiError> {
    let slot = state.monitor.lock().await;
    let handle = slot
        .as_ref()
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "no monitor has been started"))?;

    Ok(Json(MonitorStatus {
        state: handle.state().await,
        events: handle.events().await,
        objects: handle.objects().await,
    }))
}

#[derive(Debug, Deserialize)]
struct TranscriptRequest {
    text: String,
}

/// POST /monitor/transcript - Append speech-capture text to the running loop
async fn append_transcript(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TranscriptRequest>,
) -> Result<StatusCode, ApiError> {
    let slot = state.monitor.lock().await;
    let handle = slot
        .as_ref()
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "no monitor has been started"))?;

    if req.text.trim().is_empty() {
        return Ok(StatusCode::NO_CONTENT);
    }
    handle.append_transcript(req.text.trim()).await;
    Ok(StatusCode::NO_CONTENT)
}
