//! Devbox CLI integration for regenerating the lock file after updates
//!
//! This module provides:
//! - A bounded command runner shared with the git integration
//! - The `LockRegenerator` seam and its `devbox install` implementation

use crate::error::CommandError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Default time budget for `devbox install`
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Run a command in `working_dir`, failing if it does not finish within `timeout`
pub(crate) async fn run_command(
    program: &str,
    args: &[&str],
    working_dir: &Path,
    timeout: Duration,
) -> Result<Output, CommandError> {
    debug!(program, ?args, dir = %working_dir.display(), "Running command");

    let child = Command::new(program)
        .args(args)
        .current_dir(working_dir)
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(CommandError::from_spawn(program, e)),
        Err(_) => Err(CommandError::Timeout {
            program: program.to_string(),
            seconds: timeout.as_secs(),
        }),
    }
}

/// Turn a finished command into an error when it exited non-zero
pub(crate) fn check_status(program: &str, output: &Output) -> Result<(), CommandError> {
    if output.status.success() {
        return Ok(());
    }
    Err(CommandError::Failed {
        program: program.to_string(),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Regenerates the lock file next to a manifest
#[async_trait]
pub trait LockRegenerator: Send + Sync {
    /// Resolve the manifest in `working_dir` and write a fresh lock file
    async fn regenerate(&self, working_dir: &Path) -> Result<(), CommandError>;
}

/// Lock regenerator backed by the `devbox` binary
#[derive(Debug, Clone)]
pub struct DevboxCli {
    program: String,
    timeout: Duration,
    /// Version the workflow asked for; `latest` accepts anything
    expected_version: String,
}

impl DevboxCli {
    /// Create a runner for `devbox` on PATH
    pub fn new(expected_version: impl Into<String>) -> Self {
        Self {
            program: "devbox".to_string(),
            timeout: DEFAULT_INSTALL_TIMEOUT,
            expected_version: expected_version.into(),
        }
    }

    /// Use a different binary (absolute path or name on PATH)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the install time budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Report the installed devbox version, warning on mismatch
    async fn check_version(&self, working_dir: &Path) -> Option<String> {
        let output = run_command(
            &self.program,
            &["version"],
            working_dir,
            Duration::from_secs(30),
        )
        .await
        .ok()?;
        let installed = String::from_utf8_lossy(&output.stdout).trim().to_string();

        if !version_matches(&self.expected_version, &installed) {
            warn!(
                expected = %self.expected_version,
                installed = %installed,
                "Installed devbox version differs from the requested one"
            );
        }
        Some(installed)
    }
}

/// `latest` matches anything; otherwise compare ignoring a leading `v`
fn version_matches(expected: &str, installed: &str) -> bool {
    let expected = expected.trim().trim_start_matches('v');
    expected == crate::domain::LATEST_VERSION
        || installed.trim().trim_start_matches('v') == expected
}

#[async_trait]
impl LockRegenerator for DevboxCli {
    async fn regenerate(&self, working_dir: &Path) -> Result<(), CommandError> {
        if let Some(version) = self.check_version(working_dir).await {
            info!(version = %version, "Using devbox");
        }

        let output = run_command(&self.program, &["install"], working_dir, self.timeout).await?;
        check_status(&self.program, &output)?;

        info!("Regenerated lock file with devbox install");
        Ok(())
    }
}
