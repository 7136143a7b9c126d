mod capture;
mod constants;
mod extract;
mod models;
mod routes;
mod sampler;
mod services;
mod stats;
mod storage;

use axum::{Router, extract::DefaultBodyLimit, routing::get};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use capture::MonitorHandle;
use constants::{MAX_VIDEO_UPLOAD_SIZE, SESSIONS_FILE};
use services::alerts::AlertClient;
use services::auth::IdentityClient;
use services::detector::DetectorClient;
use services::inference::InferenceClient;
use storage::SessionStore;

pub struct AppState {
    /// Shared detection client; the lock serializes calls so the backoff
    /// gate sees every attempt
    detector: Arc<Mutex<DetectorClient>>,
    alerts: Option<AlertClient>,
    identity: Option<IdentityClient>,
    sessions: SessionStore,
    /// At most one live monitor at a time
    monitor: Mutex<Option<MonitorHandle>>,
    stream_url: Option<String>,
}

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() {
    let api_key =
        std::env::var("GOOGLE_GEMINI_API_KEY").expect("GOOGLE_GEMINI_API_KEY must be set");
    let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());

    let detector = Arc::new(Mutex::new(DetectorClient::new(InferenceClient::new(
        &api_key, &model,
    ))));

    // Alert dispatch is optional; without an endpoint dangerous events are
    // still recorded, just never mailed out
    let alerts = std::env::var("ALERT_ENDPOINT")
        .ok()
        .map(|endpoint| AlertClient::new(endpoint, std::env::var("ALERT_AUTH_TOKEN").ok()));
    if alerts.is_none() {
        println!("[alerts] ALERT_ENDPOINT not set, alert dispatch disabled");
    }

    let identity = std::env::var("AUTH_BASE_URL").ok().map(IdentityClient::new);

    let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| ".".to_string()));
    let sessions = SessionStore::new(data_dir.join(SESSIONS_FILE));

    let state = Arc::new(AppState {
        detector,
        alerts,
        identity,
        sessions,
        monitor: Mutex::new(None),
        stream_url: std::env::var("STREAM_URL").ok(),
    });

    let app = Router::new()
        .route("/health", get(health))
        .merge(routes::build_routes())
        .layer(DefaultBodyLimit::max(MAX_VIDEO_UPLOAD_SIZE))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {}: {}", addr, e));

    println!("Listening on http://{}", addr);
    println!("[detect] Using model {}", model);
    axum::serve(listener, app).await.expect("Server failed");
}
