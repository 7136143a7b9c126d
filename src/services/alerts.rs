//! Alert dispatch to the external notification (email) endpoint
//!
//! Dispatch is fire-and-forget relative to the capture loop: a failed send is
//! logged and surfaced where a user is watching, but never retried and never
//! removes the event from the list.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::models::TimedEvent;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Outcomes the caller distinguishes when a dispatch fails.
#[derive(Debug)]
pub enum AlertError {
    /// 401 from the endpoint: the user needs to sign in
    Unauthorized,
    /// 500 from the endpoint: fixed operator-facing message
    Misconfigured,
    /// Anything else: echo the upstream error
    Upstream(String),
    Http(reqwest::Error),
}

impl fmt::Display for AlertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertError::Unauthorized => write!(f, "please sign in to send alerts"),
            AlertError::Misconfigured => {
                write!(f, "alert service is not configured, contact the operator")
            }
            AlertError::Upstream(message) => write!(f, "alert dispatch failed: {message}"),
            AlertError::Http(err) => write!(f, "alert dispatch failed: {err}"),
        }
    }
}

impl std::error::Error for AlertError {}

impl From<reqwest::Error> for AlertError {
    fn from(value: reqwest::Error) -> Self {
        AlertError::Http(value)
    }
}

#[derive(Serialize)]
struct AlertRequest<'a> {
    title: &'a str,
    description: &'a str,
}

#[derive(Deserialize)]
struct AlertResponse {
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Client for the notification endpoint.
#[derive(Debug, Clone)]
pub struct AlertClient {
    endpoint: String,
    auth_token: Option<String>,
    http: Client,
}

impl AlertClient {
    pub fn new(endpoint: impl Into<String>, auth_token: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            endpoint: endpoint.into(),
            auth_token,
            http,
        }
    }

    /// Post one notification. Response body is `{data}` on success or
    /// `{error}` on failure.
    pub async fn send(&self, title: &str, description: &str) -> Result<(), AlertError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&AlertRequest { title, description });
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => return Err(AlertError::Unauthorized),
            StatusCode::INTERNAL_SERVER_ERROR => return Err(AlertError::Misconfigured),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(AlertError::Upstream(format!("{status}: {body}")));
            }
            _ => {}
        }

        // A 200 can still carry {error} in the body
        let body: AlertResponse = response
            .json()
            .await
            .unwrap_or(AlertResponse { error: None });
        if let Some(error) = body.error {
            return Err(AlertError::Upstream(error.to_string()));
        }

        Ok(())
    }
}

/// Build the notification payload for one dangerous event.
pub fn alert_for_event(event: &TimedEvent) -> (String, String) {
    (
        "[IMPORTANT] SECURITY ALERT".to_string(),
        format!("[{}] {}", event.timestamp, event.description),
    )
}

/// Fire-and-forget dispatch used by the live capture loop. Failures are
/// logged; the loop never waits on or reacts to the outcome.
pub fn dispatch_alert(client: AlertClient, event: TimedEvent) {
    tokio::spawn(async move {
        let (title, description) = alert_for_event(&event);
        if let Err(err) = client.send(&title, &description).await {
            eprintln!(
                "[alerts] Dispatch failed for event at {}: {}",
                event.timestamp, err
            );
        } else {
            println!("[alerts] Alert sent for event at {}", event.timestamp);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_payload_carries_timestamped_description() {
        let event = TimedEvent {
            timestamp: "01:25".to_string(),
            description: "person collapses near escalator".to_string(),
            is_dangerous: true,
        };
        let (title, description) = alert_for_event(&event);
        assert_eq!(title, "[IMPORTANT] SECURITY ALERT");
        assert_eq!(description, "[01:25] person collapses near escalator");
    }
}
