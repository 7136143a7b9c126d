//! Alert test endpoint (/alerts/test)

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, api_error};
use crate::AppState;
use crate::services::alerts::AlertError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/alerts/test", post(send_test_alert))
}

#[derive(Debug, Deserialize)]
struct TestAlertRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct TestAlertResponse {
    data: &'static str,
}

/// POST /alerts/test - Send one notification through the configured endpoint
async fn send_test_alert(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TestAlertRequest>,
) -> Result<Json<TestAlertResponse>, ApiError> {
    let client = state.alerts.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            AlertError::Misconfigured.to_string(),
        )
    })?;

    let title = req.title.as_deref().unwrap_or("[TEST] OmniGuard alert");
    let description = req
        .description
        .as_deref()
        .unwrap_or("This is a test notification.");

    client.send(title, description).await.map_err(alert_error)?;

    Ok(Json(TestAlertResponse {
        data: "Alert sent successfully",
    }))
}

fn alert_error(err: AlertError) -> ApiError {
    let status = match &err {
        AlertError::Unauthorized => StatusCode::UNAUTHORIZED,
        AlertError::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR,
        AlertError::Upstream(_) | AlertError::Http(_) => StatusCode::BAD_GATEWAY,
    };
    eprintln!("[alerts] Test alert failed: {}", err);
    api_error(status, err.to_string())
}
