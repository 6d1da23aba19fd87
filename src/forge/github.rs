//! GitHub REST implementation of `ForgeClient`
//!
//! Endpoints used (all under `/repos/{owner}/{repo}`):
//! - `GET /pulls?state=open` (every page, following `Link: rel="next"`),
//!   `GET|PATCH /pulls/{n}`, `POST /pulls`
//! - `GET /git/ref/heads/{branch}`, `POST /git/refs`, `DELETE /git/refs/heads/{branch}`
//! - `GET /` for the default branch

use super::{Branch, ForgeClient, NewPullRequest, PullRequest};
use crate::error::ForgeError;
use crate::registry::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LINK};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Public GitHub API
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// REST API version pinned in every request
pub const GITHUB_API_VERSION: &str = "2022-11-28";

/// Largest page GitHub serves
const PER_PAGE: &str = "100";

/// Upper bound on pages fetched for one listing
const MAX_PAGES: usize = 50;

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Deserialize)]
struct Repository {
    default_branch: String,
}

/// GitHub client scoped to one repository
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    api_url: String,
    repository: String,
    token: String,
}

impl GitHubClient {
    /// Create a client for `repository` (`owner/name`) against the public API
    pub fn new(token: impl Into<String>, repository: impl Into<String>) -> Result<Self, ForgeError> {
        Self::with_config(token, repository, DEFAULT_API_URL, DEFAULT_TIMEOUT)
    }

    /// Create a client against a custom API root, e.g. GitHub Enterprise
    pub fn with_config(
        token: impl Into<String>,
        repository: impl Into<String>,
        api_url: &str,
        timeout: Duration,
    ) -> Result<Self, ForgeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| ForgeError::api("client setup", None, e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            repository: repository.into(),
            token: token.into(),
        })
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}{}", self.api_url, self.repository, path)
    }

    /// Send a request and turn every non-2xx answer into a `ForgeError`
    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response, ForgeError> {
        debug!(operation, repository = %self.repository, "GitHub request");
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let rate_limited = response
            .headers()
            .get("x-ratelimit-remaining")
            .is_some_and(|v| v.as_bytes() == b"0");
        let message = response
            .json::<ApiMessage>()
            .await
            .ok()
            .and_then(|m| m.message);

        Err(ForgeError::api(
            operation,
            Some(status.as_u16()),
            describe_status(status, rate_limited, message.as_deref()),
        ))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<T, ForgeError> {
        self.send(operation, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| transport_error(operation, e))
    }
}

/// Message for a failed API call; transient failures carry the wording
/// the error classifier treats as retryable
pub(crate) fn describe_status(status: StatusCode, rate_limited: bool, message: Option<&str>) -> String {
    let detail = message.unwrap_or("no message");
    let rate_limit_text = message.is_some_and(|m| m.to_lowercase().contains("rate limit"));

    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && (rate_limited || rate_limit_text))
    {
        format!("rate limit exceeded (HTTP {}): {}", status.as_u16(), detail)
    } else if status == StatusCode::SERVICE_UNAVAILABLE {
        format!("service unavailable (HTTP 503): {}", detail)
    } else if status.is_server_error() {
        format!("server error (HTTP {}): {}", status.as_u16(), detail)
    } else {
        format!("HTTP {}: {}", status.as_u16(), detail)
    }
}

/// Target of the `rel="next"` entry in a `Link` header
pub(crate) fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params.split(';').any(|p| p.trim() == r#"rel="next""#);
        is_next.then(|| {
            target
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}

fn transport_error(operation: &str, e: reqwest::Error) -> ForgeError {
    if e.is_timeout() {
        ForgeError::api(operation, None, "timeout while contacting GitHub")
    } else if e.is_decode() {
        ForgeError::api(operation, None, format!("invalid response body: {}", e))
    } else {
        ForgeError::api(operation, None, format!("connection error: {}", e))
    }
}

#[async_trait]
impl ForgeClient for GitHubClient {
    async fn list_open_pulls(&self) -> Result<Vec<PullRequest>, ForgeError> {
        let operation = "list pull requests";
        let mut next = Some(format!(
            "{}?state=open&per_page={}",
            self.repo_url("/pulls"),
            PER_PAGE
        ));
        let mut pulls = Vec::new();

        for _ in 0..MAX_PAGES {
            let Some(url) = next.take() else { break };
            let response = self.send(operation, self.client.get(url)).await?;
            next = next_page_url(response.headers());
            let page: Vec<PullRequest> = response
                .json()
                .await
                .map_err(|e| transport_error(operation, e))?;
            pulls.extend(page);
        }

        if next.is_some() {
            warn!(pages = MAX_PAGES, "Stopped listing open pull requests at the page limit");
        }
        Ok(pulls)
    }

    async fn get_pull(&self, number: u64) -> Result<PullRequest, ForgeError> {
        let request = self.client.get(self.repo_url(&format!("/pulls/{}", number)));
        self.send_json("get pull request", request).await
    }

    async fn create_pull(&self, pull: &NewPullRequest) -> Result<PullRequest, ForgeError> {
        let request = self.client.post(self.repo_url("/pulls")).json(pull);
        self.send_json("create pull request", request).await
    }

    async fn update_pull(
        &self,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, ForgeError> {
        let request = self
            .client
            .patch(self.repo_url(&format!("/pulls/{}", number)))
            .json(&json!({ "title": title, "body": body }));
        self.send_json("update pull request", request).await
    }

    async fn get_branch(&self, name: &str) -> Result<Option<Branch>, ForgeError> {
        let request = self
            .client
            .get(self.repo_url(&format!("/git/ref/heads/{}", name)));
        match self.send_json::<GitRef>("get branch", request).await {
            Ok(git_ref) => Ok(Some(Branch {
                name: name.to_string(),
                sha: git_ref.object.sha,
            })),
            Err(e) if e.status() == Some(404) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_branch(&self, name: &str, sha: &str) -> Result<(), ForgeError> {
        let request = self.client.post(self.repo_url("/git/refs")).json(&json!({
            "ref": format!("refs/heads/{}", name),
            "sha": sha,
        }));
        match self.send("create branch", request).await {
            Ok(_) => Ok(()),
            Err(e) if e.status() == Some(422) => Err(ForgeError::AlreadyExists {
                reference: name.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn delete_branch(&self, name: &str) -> Result<(), ForgeError> {
        let request = self
            .client
            .delete(self.repo_url(&format!("/git/refs/heads/{}", name)));
        self.send("delete branch", request).await.map(|_| ())
    }

    async fn default_branch(&self) -> Result<String, ForgeError> {
        let request = self.client.get(self.repo_url(""));
        let repo: Repository = self.send_json("get repository", request).await?;
        Ok(repo.default_branch)
    }
}
