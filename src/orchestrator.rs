//! Run orchestration for the update workflow
//!
//! This module provides:
//! - Workflow coordination: validate → scan → find PR → apply → create/update PR
//! - Construction of the production collaborators after input validation
//! - Classification of any failure into the run report and outputs

use crate::cli::ActionInputs;
use crate::error::{AppError, ConfigError, ForgeError};
use crate::forge::{ForgeClient, GitHubClient};
use crate::manifest::ManifestWriter;
use crate::output::ActionOutputs;
use crate::package_manager::{DevboxCli, LockRegenerator};
use crate::pull_request::{ConflictStrategy, PrSettings, PullRequestManager};
use crate::registry::{HttpClient, NixhubApi, RegistryApi, RegistryClient, DEFAULT_TIMEOUT};
use crate::retry::{ErrorContext, ErrorInfo, RetryExecutor};
use crate::scanner::UpdateScanner;
use crate::vcs::{GitCli, Vcs};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// External collaborators of a run
#[derive(Clone)]
pub struct Services {
    pub registry: Arc<dyn RegistryApi>,
    pub forge: Arc<dyn ForgeClient>,
    pub regenerator: Arc<dyn LockRegenerator>,
    pub vcs: Arc<dyn Vcs>,
}

impl Services {
    /// Devbox search API, GitHub REST API, `devbox` and `git` on PATH
    pub fn production(inputs: &ActionInputs, token: &str, repository: &str) -> Result<Self, AppError> {
        let http = HttpClient::new()?;
        let forge = GitHubClient::with_config(token, repository, &inputs.api_url, DEFAULT_TIMEOUT)?;

        Ok(Self {
            registry: Arc::new(NixhubApi::with_base_url(http, inputs.registry_url.clone())),
            forge: Arc::new(forge),
            regenerator: Arc::new(DevboxCli::new(inputs.devbox_version.clone())),
            vcs: Arc::new(GitCli::new(".")),
        })
    }
}

/// Outcome of one run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Outputs to publish; always set, even for failed runs
    pub outputs: ActionOutputs,
    /// Classification of the failure, if the run failed
    pub error: Option<ErrorInfo>,
}

impl RunReport {
    /// Returns true if the run finished without error
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Report for a run whose inputs could not be parsed
    pub fn rejected(err: ConfigError) -> Self {
        let mut context = ErrorContext::new();
        context.insert("phase".to_string(), Value::from("inputs"));
        Self::failed(
            ActionOutputs::default(),
            &err.into(),
            &RetryExecutor::default(),
            context,
        )
    }

    fn failed(
        mut outputs: ActionOutputs,
        err: &AppError,
        retry: &RetryExecutor,
        context: ErrorContext,
    ) -> Self {
        let info = retry.classifier().classify(err, context);
        outputs.error_message = Some(info.user_message());
        Self {
            outputs,
            error: Some(info),
        }
    }
}

/// Coordinates one update run
pub struct Orchestrator {
    inputs: ActionInputs,
    retry: RetryExecutor,
    services: Option<Services>,
}

impl Orchestrator {
    /// Orchestrator using the production collaborators
    pub fn new(inputs: ActionInputs) -> Self {
        Self {
            inputs,
            retry: RetryExecutor::default(),
            services: None,
        }
    }

    /// Orchestrator with explicit collaborators (for testing)
    pub fn with_services(inputs: ActionInputs, services: Services) -> Self {
        Self {
            inputs,
            retry: RetryExecutor::default(),
            services: Some(services),
        }
    }

    /// Replace the retry executor
    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    /// Run the workflow. Never fails: errors are classified into the report.
    pub async fn run(&self) -> RunReport {
        let mut outputs = ActionOutputs::default();
        let mut phase = "validate";

        let result = self.execute(&mut outputs, &mut phase).await;
        match result {
            Ok(()) => RunReport {
                outputs,
                error: None,
            },
            Err(err) => {
                let mut context = ErrorContext::new();
                context.insert("phase".to_string(), Value::from(phase));
                context.insert(
                    "manifest".to_string(),
                    Value::from(self.inputs.manifest_path.display().to_string()),
                );
                RunReport::failed(outputs, &err, &self.retry, context)
            }
        }
    }

    async fn execute(
        &self,
        outputs: &mut ActionOutputs,
        phase: &mut &'static str,
    ) -> Result<(), AppError> {
        let validated = self.inputs.validate()?;
        let services = match &self.services {
            Some(services) => services.clone(),
            None => Services::production(&self.inputs, &validated.token, &validated.repository)?,
        };
        let retry_config = self.inputs.retry_config();

        *phase = "scan";
        let registry = RegistryClient::new(services.registry.clone(), self.retry.clone())
            .with_latest_refresh(self.inputs.update_latest);
        let scanner = UpdateScanner::new(&self.inputs.manifest_path, registry);
        let summary = self
            .retry
            .execute("scan devbox.json", &retry_config, || {
                scanner.generate_update_summary()
            })
            .await?;

        outputs.changes = summary.has_changes();
        outputs.update_summary = summary.summary().to_string();
        if !summary.has_changes() {
            info!("{}", summary.summary());
            return Ok(());
        }

        *phase = "find existing pull request";
        let prs = PullRequestManager::new(
            services.forge.clone(),
            self.retry.clone(),
            PrSettings {
                branch_prefix: self.inputs.normalized_branch_prefix(),
                heading: self.inputs.pr_title.clone(),
                conflict_strategy: self.inputs.conflict_strategy,
                preserve_existing: self.inputs.preserve_existing,
                retry: retry_config.clone(),
            },
        );
        let existing = prs.check_existing_pr().await?;
        outputs.existing_pr_found = existing.is_some();
        if let Some(pr) = &existing {
            if self.inputs.conflict_strategy == ConflictStrategy::Fail {
                return Err(ForgeError::Conflict { number: pr.number }.into());
            }
        }

        *phase = "apply updates";
        let writer = ManifestWriter::new(
            &self.inputs.manifest_path,
            services.regenerator.clone(),
            services.vcs.clone(),
        );
        let written = writer.apply_updates(summary.updates()).await?;
        if !written.has_commit() {
            info!("devbox.json and devbox.lock are unchanged; no pull request needed");
            return Ok(());
        }

        let outcome = match existing {
            Some(pr) => {
                *phase = "update pull request";
                services.vcs.push(&pr.branch).await?;
                prs.update_existing_pr(&pr, &summary).await?
            }
            None => {
                *phase = "create pull request";
                let branch = prs.get_or_create_update_branch(&summary).await?;
                services.vcs.push(&branch).await?;
                prs.create_update_pr(&summary, &branch).await?
            }
        };

        outputs.pr_number = Some(outcome.number);
        outputs.pr_updated = outcome.updated;
        info!(
            number = outcome.number,
            branch = %outcome.branch,
            url = outcome.url.as_deref().unwrap_or(""),
            updated = outcome.updated,
            "Update pull request ready"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use crate::pull_request::tests::{pull, MockForge};
    use crate::registry::tests::{fast_retry, MockRegistry};
    use crate::retry::ErrorCategory;
    use crate::vcs::CommitOutcome;
    use async_trait::async_trait;
    use chrono::Utc;
    use clap::Parser;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct WritingRegenerator;

    #[async_trait]
    impl LockRegenerator for WritingRegenerator {
        async fn regenerate(&self, working_dir: &Path) -> Result<(), CommandError> {
            fs::write(working_dir.join("devbox.lock"), "{\"lockfile_version\":\"1\"}")
                .map_err(|e| CommandError::from_spawn("devbox", e))
        }
    }

    #[derive(Default)]
    struct RecordingVcs {
        commits: Mutex<Vec<String>>,
        pushes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Vcs for RecordingVcs {
        async fn commit(&self, _paths: &[PathBuf], message: &str) -> Result<CommitOutcome, CommandError> {
            self.commits.lock().unwrap().push(message.to_string());
            Ok(CommitOutcome::Committed)
        }

        async fn push(&self, branch: &str) -> Result<(), CommandError> {
            self.pushes.lock().unwrap().push(branch.to_string());
            Ok(())
        }
    }

    struct Fixture {
        dir: TempDir,
        forge: Arc<MockForge>,
        vcs: Arc<RecordingVcs>,
    }

    impl Fixture {
        fn new(manifest: &str) -> Self {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("devbox.json"), manifest).unwrap();
            Self {
                dir,
                forge: Arc::new(MockForge::default()),
                vcs: Arc::new(RecordingVcs::default()),
            }
        }

        fn orchestrator(&self, registry: MockRegistry, extra: &[&str]) -> Orchestrator {
            let manifest = self.dir.path().join("devbox.json");
            let mut args = vec![
                "devbox-updater".to_string(),
                "--token".to_string(),
                "ghp_test".to_string(),
                "--repository".to_string(),
                "owner/repo".to_string(),
                "--branch-prefix".to_string(),
                "devbox".to_string(),
                "--max-retries".to_string(),
                "0".to_string(),
                "--manifest-path".to_string(),
                manifest.display().to_string(),
            ];
            args.extend(extra.iter().map(|s| s.to_string()));

            let services = Services {
                registry: Arc::new(registry),
                forge: self.forge.clone(),
                regenerator: Arc::new(WritingRegenerator),
                vcs: self.vcs.clone(),
            };
            Orchestrator::with_services(ActionInputs::parse_from(args), services)
                .with_retry(fast_retry())
        }
    }

    #[tokio::test]
    async fn test_run_creates_pr() {
        let fixture = Fixture::new(r#"{"packages":["nodejs@18.0.0"]}"#);
        let report = fixture
            .orchestrator(MockRegistry::with(&[("nodejs", Some("20.10.0"))]), &[])
            .run()
            .await;

        assert!(report.is_success(), "{:?}", report.error);
        assert!(report.outputs.changes);
        assert!(!report.outputs.existing_pr_found);
        assert!(!report.outputs.pr_updated);
        assert_eq!(report.outputs.pr_number, Some(100));
        assert_eq!(
            *fixture.vcs.pushes.lock().unwrap(),
            vec!["devbox/nodejs-20-10-0".to_string()]
        );
        assert_eq!(
            fixture.forge.pulls.lock().unwrap()[0].title,
            "chore: update nodejs from 18.0.0 to 20.10.0"
        );
    }

    #[tokio::test]
    async fn test_run_no_changes() {
        let fixture = Fixture::new(r#"{"packages":["go@1.22.0"]}"#);
        let report = fixture
            .orchestrator(MockRegistry::with(&[("go", Some("1.22.0"))]), &[])
            .run()
            .await;

        assert!(report.is_success());
        assert!(!report.outputs.changes);
        assert_eq!(report.outputs.update_summary, "All Devbox packages are up to date.");
        assert!(fixture.vcs.commits.lock().unwrap().is_empty());
        assert!(fixture.forge.pulls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_updates_existing_pr() {
        let fixture = Fixture::new(r#"{"packages":["go@1.21.0","jq@1.7.0"]}"#);
        fixture.forge.pulls.lock().unwrap().push(pull(
            9,
            "devbox/multi-package-updates",
            "chore: update 2 Devbox packages",
            Utc::now(),
        ));

        let report = fixture
            .orchestrator(
                MockRegistry::with(&[("go", Some("1.22.0")), ("jq", Some("1.7.1"))]),
                &[],
            )
            .run()
            .await;

        assert!(report.is_success(), "{:?}", report.error);
        assert!(report.outputs.existing_pr_found);
        assert!(report.outputs.pr_updated);
        assert_eq!(report.outputs.pr_number, Some(9));
        assert_eq!(
            *fixture.vcs.pushes.lock().unwrap(),
            vec!["devbox/multi-package-updates".to_string()]
        );
    }

    #[tokio::test]
    async fn test_run_fail_strategy_leaves_manifest() {
        let manifest = r#"{"packages":["go@1.21.0"]}"#;
        let fixture = Fixture::new(manifest);
        fixture
            .forge
            .pulls
            .lock()
            .unwrap()
            .push(pull(9, "devbox/go-1-22-0", "chore: update go", Utc::now()));

        let report = fixture
            .orchestrator(
                MockRegistry::with(&[("go", Some("1.22.0"))]),
                &["--conflict-strategy", "fail"],
            )
            .run()
            .await;

        assert!(!report.is_success());
        assert!(report.outputs.existing_pr_found);
        assert_eq!(
            fs::read_to_string(fixture.dir.path().join("devbox.json")).unwrap(),
            manifest
        );
    }

    #[tokio::test]
    async fn test_run_missing_token_is_configuration_error() {
        let fixture = Fixture::new(r#"{"packages":["go@1.21.0"]}"#);
        let report = fixture
            .orchestrator(MockRegistry::default(), &["--token", ""])
            .run()
            .await;

        let info = report.error.unwrap();
        assert_eq!(info.category, ErrorCategory::Configuration);
        assert!(!info.retryable);
        let message = report.outputs.error_message.unwrap();
        assert!(message.starts_with("missing GitHub token"));
        assert!(message.contains("Suggestions:"));
    }

    #[tokio::test]
    async fn test_run_invalid_manifest_is_validation_error() {
        let fixture = Fixture::new(r#"{"packages":[]}"#);
        let report = fixture.orchestrator(MockRegistry::default(), &[]).run().await;

        let info = report.error.unwrap();
        assert_eq!(info.category, ErrorCategory::Validation);
        assert_eq!(info.context.get("phase"), Some(&Value::from("scan")));
        assert!(!report.outputs.changes);
    }

    #[test]
    fn test_rejected_inputs_report() {
        let err = ActionInputs::try_parse_from(["devbox-updater", "--max-retries", "abc"]).unwrap_err();
        let report = RunReport::rejected(crate::cli::input_error(&err));

        assert!(!report.is_success());
        let info = report.error.unwrap();
        assert_eq!(info.category, ErrorCategory::Configuration);
        assert_eq!(info.context.get("phase"), Some(&Value::from("inputs")));
        assert!(!report.outputs.changes);
        assert!(report
            .outputs
            .error_message
            .unwrap()
            .starts_with("invalid configuration: invalid value 'abc'"));
    }
}
