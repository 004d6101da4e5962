//! HTTP client for the IPos REST API.

use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::auth::Credentials;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Login endpoint, relative to the base URL
const AUTH_PATH: &str = "/auth";

/// Current user endpoint, relative to the base URL
const USER_PATH: &str = "/s/customers/user";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    login: &'a str,
    password: &'a str,
}

/// Body of a successful `POST /auth`.
///
/// The token is optional on the wire; its absence is a protocol error the
/// caller has to handle.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
}

/// API client for IPos.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct IPosClient {
    client: Client,
    base_url: String,
}

impl IPosClient {
    /// Create a client with the default request timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange credentials for an access token. One attempt, no retry.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let url = self.url(AUTH_PATH);
        debug!(url = %url, "Sending login request");

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest {
                login: &credentials.identity,
                password: &credentials.secret,
            })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }

    /// Fetch the current user's profile using `token` as bearer credential.
    /// Returns the raw API payload.
    pub async fn fetch_user_info(&self, token: &str) -> Result<Value, ApiError> {
        let url = self.url(USER_PATH);
        debug!(url = %url, "Fetching current user");

        let response = self.client.get(&url).bearer_auth(token).send().await?;

        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::MalformedBody(e.to_string()))
    }
}
