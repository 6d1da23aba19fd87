//! Hosted forge (GitHub) access
//!
//! This module provides:
//! - Pull request and branch types returned by the forge
//! - The `ForgeClient` trait used by the pull request reconciler
//! - A REST implementation against the GitHub API

mod github;

pub use github::{GitHubClient, DEFAULT_API_URL, GITHUB_API_VERSION};

use crate::error::ForgeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Head or base reference of a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(default)]
    pub sha: String,
}

/// Pull request as returned by the forge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    pub head: PullRef,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Fields needed to open a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

/// A branch and the commit it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub sha: String,
}

/// Read projection of an open update pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistingPrInfo {
    pub number: u64,
    pub branch: String,
    pub title: String,
    pub body: String,
    pub state: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&PullRequest> for ExistingPrInfo {
    fn from(pr: &PullRequest) -> Self {
        Self {
            number: pr.number,
            branch: pr.head.ref_name.clone(),
            title: pr.title.clone(),
            body: pr.body.clone().unwrap_or_default(),
            state: pr.state.clone(),
            updated_at: pr.updated_at,
        }
    }
}

/// REST operations the reconciler needs from the forge
#[async_trait]
pub trait ForgeClient: Send + Sync {
    /// Open pull requests of the repository
    async fn list_open_pulls(&self) -> Result<Vec<PullRequest>, ForgeError>;

    /// Pull request by number
    async fn get_pull(&self, number: u64) -> Result<PullRequest, ForgeError>;

    /// Open a pull request
    async fn create_pull(&self, pull: &NewPullRequest) -> Result<PullRequest, ForgeError>;

    /// Replace title and body of a pull request
    async fn update_pull(
        &self,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, ForgeError>;

    /// Branch by name, `None` when it does not exist
    async fn get_branch(&self, name: &str) -> Result<Option<Branch>, ForgeError>;

    /// Create `name` pointing at `sha`; `ForgeError::AlreadyExists` when taken
    async fn create_branch(&self, name: &str, sha: &str) -> Result<(), ForgeError>;

    /// Delete a branch
    async fn delete_branch(&self, name: &str) -> Result<(), ForgeError>;

    /// Name of the repository's default branch
    async fn default_branch(&self) -> Result<String, ForgeError>;
}
