//! Identity check against the external authentication provider
//!
//! The provider either knows the bearer token (present user record) or it
//! does not. No authorization boundary is enforced here; routes only branch
//! on presence.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const REQUEST_TIMEOUT_SECS: u64 = 15;

/// User record returned by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IdentityClient {
    base_url: String,
    http: Client,
}

impl IdentityClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Look up the user behind a bearer token. `None` means the provider has
    /// no record for it; errors are transport-level only.
    pub async fn get_user(&self, token: &str) -> Result<Option<UserRecord>, reqwest::Error> {
        let url = format!("{}/user", self.base_url);
        let response = self.http.get(&url).bearer_auth(token).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED
            || response.status() == StatusCode::NOT_FOUND
        {
            return Ok(None);
        }

        let response = response.error_for_status()?;
        let user: UserRecord = response.json().await?;
        Ok(Some(user))
    }
}
