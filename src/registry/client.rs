//! HTTP client shared foundation
//!
//! This module provides a shared HTTP client with:
//! - Configurable timeout and User-Agent
//! - JSON `Accept` header on every request
//! - Status and transport error mapping
//!
//! Retries are not done here; callers wrap requests in the retry executor.

use crate::error::{AppError, NetworkError, ValidationError};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default User-Agent header
pub const DEFAULT_USER_AGENT: &str = concat!("devbox-updater/", env!("CARGO_PKG_VERSION"));

/// HTTP client wrapper for registry requests
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, NetworkError> {
        Self::with_config(DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(timeout: Duration, user_agent: &str) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| NetworkError::Client {
                message: e.to_string(),
            })?;

        Ok(Self { client })
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// GET `url` with `query` parameters and decode the JSON body.
    ///
    /// A 404 means the package does not exist and is reported as a
    /// validation failure for `package`; every other failure is a
    /// network error.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        package: &str,
    ) -> Result<T, AppError> {
        let url = Url::parse_with_params(url, query)
            .map_err(|e| NetworkError::request(url, format!("invalid URL: {}", e)))?;
        let url_str = url.to_string();
        debug!(url = %url_str, "GET");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| transport_error(&url_str, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ValidationError::PackageNotFound {
                package: package.to_string(),
            }
            .into());
        }
        if !status.is_success() {
            return Err(NetworkError::Status {
                url: url_str,
                status: status.as_u16(),
            }
            .into());
        }

        response
            .json::<T>()
            .await
            .map_err(|e| transport_error(&url_str, e).into())
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> NetworkError {
    if e.is_timeout() {
        NetworkError::timeout(url)
    } else if e.is_decode() {
        NetworkError::request(url, format!("invalid response body: {}", e))
    } else {
        NetworkError::request(url, e.to_string())
    }
}
