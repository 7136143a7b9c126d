//! Batch video analysis endpoint (/analyze)

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    routing::post,
};
use bytes::Bytes;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use super::{ApiError, api_error};
use crate::AppState;
use crate::capture::run_sweep;
use crate::constants::SWEEP_STEP_SECS;
use crate::models::TimedEvent;
use crate::sampler::VideoFileSource;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/analyze", post(analyze))
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    events: Vec<TimedEvent>,
    #[serde(rename = "durationSecs")]
    duration_secs: f64,
}

/// POST /analyze - Sweep an uploaded video and return its timed events.
/// Multipart fields: `video` (required), `step` (optional seconds).
async fn analyze(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let mut video: Option<(Bytes, String)> = None;
    let mut step_secs = SWEEP_STEP_SECS;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("malformed multipart body: {err}"),
        )
    })? {
        match field.name() {
            Some("video") => {
                let ext = field
                    .file_name()
                    .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext.to_string()))
                    .unwrap_or_else(|| "mp4".to_string());
                let bytes = field.bytes().await.map_err(|err| {
                    api_error(StatusCode::BAD_REQUEST, format!("upload failed: {err}"))
                })?;
                video = Some((bytes, ext));
            }
            Some("step") => {
                let text = field.text().await.unwrap_or_default();
                step_secs = text.trim().parse().map_err(|_| {
                    api_error(StatusCode::BAD_REQUEST, "step must be a number of seconds")
                })?;
                if step_secs <= 0.0 {
                    return Err(api_error(StatusCode::BAD_REQUEST, "step must be positive"));
                }
            }
            _ => {}
        }
    }

    let (bytes, ext) =
        video.ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "missing video field"))?;
    if bytes.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "empty video upload"));
    }

    let path = spill_upload(&bytes, &ext).await?;
    let result = sweep_file(&state, &path, step_secs).await;
    let _ = tokio::fs::remove_file(&path).await;
    result.map(Json)
}

/// Write the uploaded bytes somewhere ffmpeg can read them
async fn spill_upload(bytes: &[u8], ext: &str) -> Result<PathBuf, ApiError> {
    let path = std::env::temp_dir().join(format!(
        "omniguard_upload_{}.{}",
        rand::random::<u64>(),
        ext
    ));
    tokio::fs::write(&path, bytes).await.map_err(|err| {
        eprintln!("[analyze] Failed to spool upload: {}", err);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to store upload")
    })?;
    Ok(path)
}

async fn sweep_file(
    state: &Arc<AppState>,
    path: &PathBuf,
    step_secs: f64,
) -> Result<AnalyzeResponse, ApiError> {
    let source = VideoFileSource::new(path.clone());
    let duration_secs = source.probe_duration().await.map_err(|err| {
        eprintln!("[analyze] Probe failed: {}", err);
        api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "could not determine media duration",
        )
    })?;

    let sweep_source = source.clone();
    let detector = state.detector.clone();
    let events = run_sweep(
        duration_secs,
        step_secs,
        move |offset| {
            let source = sweep_source.clone();
            async move { source.sample_at(offset).await }
        },
        move |frame| {
            let detector = detector.clone();
            async move {
                let mut detector = detector.lock().await;
                detector
                    .detect_events(&frame, None)
                    .await
                    .map(|result| result.events)
            }
        },
        |progress| {
            println!("[analyze] Step {}/{}", progress.step, progress.total_steps);
        },
    )
    .await
    .map_err(|err| {
        eprintln!("[analyze] Sweep failed: {}", err);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "analysis failed")
    })?;

    Ok(AnalyzeResponse {
        events,
        duration_secs,
    })
}
