//! User info endpoint (/me)

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
};
use std::sync::Arc;

use crate::AppState;
use crate::services::auth::UserRecord;
use crate::services::error::LogErr;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/me", get(get_me))
}

/// GET /me - Look up the user behind the bearer token
async fn get_me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<UserRecord>, StatusCode> {
    let identity = state
        .identity
        .as_ref()
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;

    let token = bearer_token(&headers).ok_or(StatusCode::UNAUTHORIZED)?;

    // Failing to reach the provider is an upstream fault, not ours
    let user = identity
        .get_user(token)
        .await
        .log_status("[auth] Identity lookup failed", StatusCode::BAD_GATEWAY)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(Json(user))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_requires_the_scheme_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert("authorization", "Basic abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
