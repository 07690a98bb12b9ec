//! HTTP client for the portfolio REST API.
//!
//! Covers the two read-only endpoints next to the chat socket: service health
//! and contact details.

use reqwest::Client;
use serde::Deserialize;

use crate::config::ClientConfig;

/// Error type for API operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP request failed or the body could not be decoded.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error detail from the response body.
        message: String,
    },
}

/// Response of `GET /api/v1/health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    /// `"healthy"` when the service is up.
    pub status: String,
    /// Service version.
    pub version: String,
}

impl HealthStatus {
    /// Whether the service reports itself healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Response of `GET /api/v1/contact`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContactInfo {
    /// Email address.
    pub email: String,
    /// `LinkedIn` profile URL.
    pub linkedin: String,
    /// GitHub profile URL.
    pub github: String,
    /// Personal website URL.
    pub website: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Client for the REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the API at `base_url` (e.g., `http://localhost:8000`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a client for the configured API URL.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.api_url.clone())
    }

    /// Check service health.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service answers with a
    /// non-success status.
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.get("/api/v1/health").await
    }

    /// Fetch contact details.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service answers with a
    /// non-success status.
    pub async fn contact_info(&self) -> Result<ContactInfo, ApiError> {
        self.get("/api/v1/contact").await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(url = %url, "API request");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn handle_error(response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.detail,
            Err(_) => "Unknown error".to_string(),
        };
        ApiError::Status { status, message }
    }
}
