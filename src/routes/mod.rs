pub mod alerts;
pub mod analyze;
pub mod detect;
pub mod monitor;
pub mod sessions;
pub mod user;

use axum::{Json, Router, http::StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(alerts::routes())
        .merge(analyze::routes())
        .merge(detect::routes())
        .merge(monitor::routes())
        .merge(sessions::routes())
        .merge(user::routes())
}

/// JSON error body returned alongside non-2xx statuses
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}
