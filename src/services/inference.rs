//! Client for the hosted multimodal inference endpoint
//!
//! Thin reqwest wrapper around the Gemini `generateContent` REST call. It
//! returns the model's raw text; pulling structured data out of that text is
//! the detector's job.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Errors that can occur while talking to the inference endpoint.
#[derive(Debug)]
pub enum InferenceError {
    Http(reqwest::Error),
    UnexpectedStatus { status: StatusCode, body: String },
    EmptyResponse,
}

impl InferenceError {
    /// True when the failure carries the upstream quota/rate-limit signature.
    pub fn is_quota(&self) -> bool {
        match self {
            InferenceError::UnexpectedStatus { status, body } => {
                *status == StatusCode::TOO_MANY_REQUESTS
                    || body.contains("quota")
                    || body.contains("RESOURCE_EXHAUSTED")
            }
            _ => false,
        }
    }
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceError::Http(err) => write!(f, "http error: {err}"),
            InferenceError::UnexpectedStatus { status, body } => {
                write!(f, "unexpected status {status}: {body}")
            }
            InferenceError::EmptyResponse => write!(f, "response contained no text"),
        }
    }
}

impl std::error::Error for InferenceError {}

impl From<reqwest::Error> for InferenceError {
    fn from(value: reqwest::Error) -> Self {
        InferenceError::Http(value)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

/// Client for the generative inference endpoint.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    base_url: String,
    model: String,
    api_key: String,
    http: Client,
}

impl InferenceClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    /// Point the client at a different host. Tests use this.
    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            http,
        }
    }

    /// Send one image (base64-encoded JPEG bytes) plus an instruction prompt
    /// and return the model's free-form text response.
    pub async fn describe_image(
        &self,
        prompt: &str,
        base64_data: &str,
        mime_type: &str,
    ) -> Result<String, InferenceError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type,
                            data: base64_data,
                        },
                    },
                ],
            }],
        };

        let response = self.http.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::UnexpectedStatus { status, body });
        }

        let body: Value = response.json().await?;
        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or(InferenceError::EmptyResponse)?;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_signature_matches_status_and_body() {
        let by_status = InferenceError::UnexpectedStatus {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
        };
        assert!(by_status.is_quota());

        let by_body = InferenceError::UnexpectedStatus {
            status: StatusCode::BAD_REQUEST,
            body: "You have exceeded your quota".to_string(),
        };
        assert!(by_body.is_quota());

        let plain = InferenceError::UnexpectedStatus {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".to_string(),
        };
        assert!(!plain.is_quota());
        assert!(!InferenceError::EmptyResponse.is_quota());
    }

    #[test]
    fn request_body_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: "describe" },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data: "aGVsbG8=",
                        },
                    },
                ],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "describe");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/jpeg"
        );
    }
}
