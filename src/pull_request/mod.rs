//! Pull request reconciliation
//!
//! This module provides:
//! - Lookup of an already open update PR so repeated runs never open duplicates
//! - Deterministic branch selection and creation
//! - PR creation and update following the configured conflict strategy
//!
//! Every forge call runs through the retry executor.

mod body;
mod branch;

pub use body::{grouped_sections, merge_body, pr_title, render_body};
pub use branch::{
    fallback_branch_name, generate_branch_name, is_update_branch, is_update_title, sanitize,
    MULTI_PACKAGE_BRANCH,
};

use crate::domain::UpdateSummary;
use crate::error::{AppError, ForgeError};
use crate::forge::{ExistingPrInfo, ForgeClient, NewPullRequest, PullRequest};
use crate::retry::{RetryConfig, RetryExecutor};
use chrono::Utc;
use clap::ValueEnum;
use futures::TryFutureExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// What to do when an update PR is already open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Leave the PR alone and fail the run
    Fail,
    /// Replace title and body
    Overwrite,
    /// Replace the title and append the new updates to the body
    #[default]
    Merge,
}

/// Reconciler settings taken from the action inputs
#[derive(Debug, Clone)]
pub struct PrSettings {
    pub branch_prefix: String,
    /// Heading at the top of generated bodies
    pub heading: String,
    pub conflict_strategy: ConflictStrategy,
    /// Keep an existing body when merging
    pub preserve_existing: bool,
    pub retry: RetryConfig,
}

/// Result of creating or updating the update PR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrOutcome {
    pub number: u64,
    pub branch: String,
    pub url: Option<String>,
    /// True when an existing PR was updated rather than created
    pub updated: bool,
}

impl PrOutcome {
    fn from_pull(pr: &PullRequest, updated: bool) -> Self {
        Self {
            number: pr.number,
            branch: pr.head.ref_name.clone(),
            url: pr.html_url.clone(),
            updated,
        }
    }
}

/// Finds, creates and updates the single update PR
pub struct PullRequestManager {
    forge: Arc<dyn ForgeClient>,
    retry: RetryExecutor,
    settings: PrSettings,
}

impl PullRequestManager {
    pub fn new(forge: Arc<dyn ForgeClient>, retry: RetryExecutor, settings: PrSettings) -> Self {
        Self {
            forge,
            retry,
            settings,
        }
    }

    pub fn settings(&self) -> &PrSettings {
        &self.settings
    }

    async fn forge_call<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ForgeError>>,
    {
        self.retry
            .execute(label, &self.settings.retry, || call().map_err(AppError::from))
            .await
    }

    /// Most recently updated open PR that belongs to this tool, if any
    pub async fn check_existing_pr(&self) -> Result<Option<ExistingPrInfo>, AppError> {
        let pulls = self
            .forge_call("list pull requests", || self.forge.list_open_pulls())
            .await?;

        let prefix = &self.settings.branch_prefix;
        let existing = pulls
            .iter()
            .filter(|pr| is_update_branch(prefix, &pr.head.ref_name) || is_update_title(&pr.title))
            .max_by_key(|pr| pr.updated_at)
            .map(ExistingPrInfo::from);

        match &existing {
            Some(pr) => info!(number = pr.number, branch = %pr.branch, "Found existing update PR"),
            None => info!("No existing update PR"),
        }
        Ok(existing)
    }

    /// Branch for `summary`, reusing it when it already exists.
    ///
    /// A new branch starts at the default branch tip. If another run creates
    /// the same branch first, a timestamped name is used instead.
    pub async fn get_or_create_update_branch(
        &self,
        summary: &UpdateSummary,
    ) -> Result<String, AppError> {
        let branch = generate_branch_name(
            &self.settings.branch_prefix,
            summary.updates(),
            Utc::now().date_naive(),
        );

        if self
            .forge_call("get branch", || self.forge.get_branch(&branch))
            .await?
            .is_some()
        {
            info!(branch = %branch, "Reusing existing update branch");
            return Ok(branch);
        }

        let default_branch = self
            .forge_call("get default branch", || self.forge.default_branch())
            .await?;
        let base = self
            .forge_call("get branch", || self.forge.get_branch(&default_branch))
            .await?
            .ok_or_else(|| {
                ForgeError::api(
                    "get branch",
                    Some(404),
                    format!("default branch '{}' not found", default_branch),
                )
            })?;

        match self
            .forge_call("create branch", || self.forge.create_branch(&branch, &base.sha))
            .await
        {
            Ok(()) => {
                info!(branch = %branch, base = %default_branch, "Created update branch");
                Ok(branch)
            }
            Err(AppError::Forge(ForgeError::AlreadyExists { .. })) => {
                let fallback = fallback_branch_name(&branch, Utc::now());
                warn!(branch = %branch, fallback = %fallback, "Branch was created concurrently");
                self.forge_call("create branch", || {
                    self.forge.create_branch(&fallback, &base.sha)
                })
                .await?;
                Ok(fallback)
            }
            Err(e) => Err(e),
        }
    }

    /// Open a PR for `summary` from `branch` into the default branch.
    /// The branch is deleted again if the PR cannot be opened.
    pub async fn create_update_pr(
        &self,
        summary: &UpdateSummary,
        branch: &str,
    ) -> Result<PrOutcome, AppError> {
        let base = self
            .forge_call("get default branch", || self.forge.default_branch())
            .await?;
        let pull = NewPullRequest {
            title: pr_title(summary.updates()),
            body: render_body(&self.settings.heading, summary.updates()),
            head: branch.to_string(),
            base,
        };

        match self
            .forge_call("create pull request", || self.forge.create_pull(&pull))
            .await
        {
            Ok(pr) => {
                info!(number = pr.number, title = %pr.title, "Opened update PR");
                Ok(PrOutcome::from_pull(&pr, false))
            }
            Err(e) => {
                if let Err(cleanup) = self.forge.delete_branch(branch).await {
                    warn!(branch, error = %cleanup, "Failed to delete branch after PR creation failed");
                }
                Err(e)
            }
        }
    }

    /// Refresh an open PR with the updates in `summary`
    pub async fn update_existing_pr(
        &self,
        existing: &ExistingPrInfo,
        summary: &UpdateSummary,
    ) -> Result<PrOutcome, AppError> {
        if self.settings.conflict_strategy == ConflictStrategy::Fail {
            return Err(ForgeError::Conflict {
                number: existing.number,
            }
            .into());
        }

        let current = self
            .forge_call("get pull request", || self.forge.get_pull(existing.number))
            .await?;
        let current_body = current.body.unwrap_or_default();

        let title = pr_title(summary.updates());
        let body = match self.settings.conflict_strategy {
            ConflictStrategy::Merge
                if self.settings.preserve_existing && !current_body.trim().is_empty() =>
            {
                merge_body(&current_body, summary.updates(), Utc::now().date_naive())
            }
            _ => render_body(&self.settings.heading, summary.updates()),
        };

        let pr = self
            .forge_call("update pull request", || {
                self.forge.update_pull(existing.number, &title, &body)
            })
            .await?;
        info!(number = pr.number, strategy = ?self.settings.conflict_strategy, "Updated update PR");
        Ok(PrOutcome::from_pull(&pr, true))
    }
}
