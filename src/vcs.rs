//! Git integration for committing and publishing updates

use crate::error::CommandError;
use crate::package_manager::{check_status, run_command};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default time budget for a single git invocation
const GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Identity used for update commits
const COMMIT_USER_NAME: &str = "github-actions[bot]";
const COMMIT_USER_EMAIL: &str = "41898282+github-actions[bot]@users.noreply.github.com";

/// Outcome of a commit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A new commit was created
    Committed,
    /// Nothing was staged; no commit was made
    NothingToCommit,
}

/// Version control operations used by the updater
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Stage `paths` and commit them with `message`
    async fn commit(&self, paths: &[PathBuf], message: &str) -> Result<CommitOutcome, CommandError>;

    /// Publish the current HEAD as `branch` on the remote
    async fn push(&self, branch: &str) -> Result<(), CommandError>;
}

/// `Vcs` backed by the git binary
#[derive(Debug, Clone)]
pub struct GitCli {
    working_dir: PathBuf,
    remote: String,
}

impl GitCli {
    /// Create a git runner for the repository at `working_dir`
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            remote: "origin".to_string(),
        }
    }

    /// Push to a remote other than `origin`
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    async fn git(&self, args: &[&str]) -> Result<std::process::Output, CommandError> {
        run_command("git", args, &self.working_dir, GIT_TIMEOUT).await
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.working_dir).unwrap_or(path)
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn commit(&self, paths: &[PathBuf], message: &str) -> Result<CommitOutcome, CommandError> {
        let mut add_args = vec!["add", "--"];
        let relative: Vec<String> = paths
            .iter()
            .map(|p| self.relative(p).display().to_string())
            .collect();
        add_args.extend(relative.iter().map(String::as_str));
        let output = self.git(&add_args).await?;
        check_status("git", &output)?;

        // Exit code 0 means the index matches HEAD
        let staged = self.git(&["diff", "--cached", "--quiet"]).await?;
        if staged.status.success() {
            info!("Nothing staged; skipping commit");
            return Ok(CommitOutcome::NothingToCommit);
        }

        let name = format!("user.name={}", COMMIT_USER_NAME);
        let email = format!("user.email={}", COMMIT_USER_EMAIL);
        let output = self
            .git(&["-c", &name, "-c", &email, "commit", "-m", message])
            .await?;
        check_status("git", &output)?;

        info!(message, "Committed updates");
        Ok(CommitOutcome::Committed)
    }

    async fn push(&self, branch: &str) -> Result<(), CommandError> {
        let refspec = format!("HEAD:refs/heads/{}", branch);
        let output = self
            .git(&["push", "--force", &self.remote, &refspec])
            .await?;
        check_status("git", &output)?;

        info!(branch, remote = %self.remote, "Pushed update branch");
        Ok(())
    }
}
