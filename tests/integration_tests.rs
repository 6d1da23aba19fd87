//! Integration tests for devbox-updater
//!
//! These tests verify:
//! - A full run against in-memory registry, forge, devbox and git stand-ins
//! - Manifest rewriting keeps unrelated sections intact
//! - Failed lock regeneration restores the manifest

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::Parser;
use devbox_updater::cli::ActionInputs;
use devbox_updater::error::{AppError, CommandError, ForgeError, ValidationError};
use devbox_updater::forge::{Branch, ForgeClient, NewPullRequest, PullRef, PullRequest};
use devbox_updater::orchestrator::{Orchestrator, Services};
use devbox_updater::package_manager::LockRegenerator;
use devbox_updater::registry::{PackageInfo, RegistryApi, ResolvedPackage};
use devbox_updater::retry::{RetryConfig, RetryExecutor};
use devbox_updater::vcs::{CommitOutcome, Vcs};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Test fixture directory creation helper
fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

struct StaticRegistry {
    versions: HashMap<String, String>,
}

impl StaticRegistry {
    fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            versions: entries
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl RegistryApi for StaticRegistry {
    async fn resolve(&self, name: &str, _version: &str) -> Result<ResolvedPackage, AppError> {
        match self.versions.get(name) {
            Some(version) => Ok(ResolvedPackage {
                name: Some(name.to_string()),
                version: Some(version.clone()),
                summary: None,
            }),
            None => Err(ValidationError::PackageNotFound {
                package: name.to_string(),
            }
            .into()),
        }
    }

    async fn package_info(&self, name: &str) -> Result<PackageInfo, AppError> {
        Ok(PackageInfo {
            name: name.to_string(),
            ..PackageInfo::default()
        })
    }
}

#[derive(Default)]
struct MemoryForge {
    pulls: Mutex<Vec<PullRequest>>,
    branches: Mutex<HashMap<String, String>>,
}

impl MemoryForge {
    fn with_main() -> Self {
        let forge = Self::default();
        forge
            .branches
            .lock()
            .unwrap()
            .insert("main".to_string(), "main-sha".to_string());
        forge
    }
}

fn open_pull(number: u64, branch: &str, title: &str, body: &str, updated_at: DateTime<Utc>) -> PullRequest {
    PullRequest {
        number,
        title: title.to_string(),
        body: Some(body.to_string()),
        state: "open".to_string(),
        head: PullRef {
            ref_name: branch.to_string(),
            sha: "head".to_string(),
        },
        updated_at,
        html_url: None,
    }
}

#[async_trait]
impl ForgeClient for MemoryForge {
    async fn list_open_pulls(&self) -> Result<Vec<PullRequest>, ForgeError> {
        Ok(self.pulls.lock().unwrap().clone())
    }

    async fn get_pull(&self, number: u64) -> Result<PullRequest, ForgeError> {
        self.pulls
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.number == number)
            .cloned()
            .ok_or_else(|| ForgeError::api("get pull request", Some(404), "Not Found"))
    }

    async fn create_pull(&self, pull: &NewPullRequest) -> Result<PullRequest, ForgeError> {
        let mut pulls = self.pulls.lock().unwrap();
        let pr = open_pull(
            pulls.len() as u64 + 1,
            &pull.head,
            &pull.title,
            &pull.body,
            Utc::now(),
        );
        pulls.push(pr.clone());
        Ok(pr)
    }

    async fn update_pull(&self, number: u64, title: &str, body: &str) -> Result<PullRequest, ForgeError> {
        let mut pulls = self.pulls.lock().unwrap();
        let pr = pulls
            .iter_mut()
            .find(|p| p.number == number)
            .ok_or_else(|| ForgeError::api("update pull request", Some(404), "Not Found"))?;
        pr.title = title.to_string();
        pr.body = Some(body.to_string());
        Ok(pr.clone())
    }

    async fn get_branch(&self, name: &str) -> Result<Option<Branch>, ForgeError> {
        Ok(self.branches.lock().unwrap().get(name).map(|sha| Branch {
            name: name.to_string(),
            sha: sha.clone(),
        }))
    }

    async fn create_branch(&self, name: &str, sha: &str) -> Result<(), ForgeError> {
        let mut branches = self.branches.lock().unwrap();
        if branches.contains_key(name) {
            return Err(ForgeError::AlreadyExists {
                reference: name.to_string(),
            });
        }
        branches.insert(name.to_string(), sha.to_string());
        Ok(())
    }

    async fn delete_branch(&self, name: &str) -> Result<(), ForgeError> {
        self.branches.lock().unwrap().remove(name);
        Ok(())
    }

    async fn default_branch(&self) -> Result<String, ForgeError> {
        Ok("main".to_string())
    }
}

/// Writes a lock file, or fails like a broken devbox install
struct FakeDevbox {
    fail: bool,
}

#[async_trait]
impl LockRegenerator for FakeDevbox {
    async fn regenerate(&self, working_dir: &Path) -> Result<(), CommandError> {
        if self.fail {
            return Err(CommandError::Failed {
                program: "devbox".to_string(),
                code: Some(1),
                stderr: "error: package not found in nixpkgs".to_string(),
            });
        }
        fs::write(
            working_dir.join("devbox.lock"),
            r#"{"lockfile_version": "1", "packages": {}}"#,
        )
        .map_err(|e| CommandError::from_spawn("devbox", e))
    }
}

#[derive(Default)]
struct FakeGit {
    commits: Mutex<Vec<(Vec<PathBuf>, String)>>,
    pushes: Mutex<Vec<String>>,
}

#[async_trait]
impl Vcs for FakeGit {
    async fn commit(&self, paths: &[PathBuf], message: &str) -> Result<CommitOutcome, CommandError> {
        self.commits
            .lock()
            .unwrap()
            .push((paths.to_vec(), message.to_string()));
        Ok(CommitOutcome::Committed)
    }

    async fn push(&self, branch: &str) -> Result<(), CommandError> {
        self.pushes.lock().unwrap().push(branch.to_string());
        Ok(())
    }
}

struct Harness {
    dir: TempDir,
    forge: Arc<MemoryForge>,
    git: Arc<FakeGit>,
}

impl Harness {
    fn new(manifest: &str) -> Self {
        let dir = create_test_dir();
        fs::write(dir.path().join("devbox.json"), manifest).unwrap();
        Self {
            dir,
            forge: Arc::new(MemoryForge::with_main()),
            git: Arc::new(FakeGit::default()),
        }
    }

    fn manifest(&self) -> String {
        fs::read_to_string(self.dir.path().join("devbox.json")).unwrap()
    }

    fn orchestrator(&self, registry: StaticRegistry, devbox: FakeDevbox, extra: &[&str]) -> Orchestrator {
        let manifest = self.dir.path().join("devbox.json").display().to_string();
        let mut args = vec![
            "devbox-updater",
            "--token",
            "ghp_test",
            "--repository",
            "owner/repo",
            "--branch-prefix",
            "devbox",
            "--manifest-path",
            manifest.as_str(),
        ];
        args.extend_from_slice(extra);

        let fast = RetryConfig {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            multiplier: 1.0,
            jitter: false,
        };
        let services = Services {
            registry: Arc::new(registry),
            forge: self.forge.clone(),
            regenerator: Arc::new(devbox),
            vcs: self.git.clone(),
        };
        Orchestrator::with_services(ActionInputs::parse_from(args), services)
            .with_retry(RetryExecutor::default().with_network_config(fast))
    }
}

mod end_to_end {
    use super::*;

    #[tokio::test]
    async fn test_single_package_update_opens_pr() {
        let harness = Harness::new(r#"{"packages":["nodejs@18.0.0"]}"#);
        let report = harness
            .orchestrator(
                StaticRegistry::new(&[("nodejs", "20.10.0")]),
                FakeDevbox { fail: false },
                &[],
            )
            .run()
            .await;

        assert!(report.is_success(), "{:?}", report.error);
        assert!(report.outputs.changes);
        assert_eq!(
            report.outputs.update_summary,
            "Found 1 package update(s):\n- nodejs: 18.0.0 → 20.10.0"
        );
        assert_eq!(report.outputs.pr_number, Some(1));

        // Manifest rewritten
        let manifest: serde_json::Value = serde_json::from_str(&harness.manifest()).unwrap();
        assert_eq!(manifest["packages"][0], "nodejs@20.10.0");

        // Branch created from main and pushed
        assert_eq!(
            harness.forge.branches.lock().unwrap().get("devbox/nodejs-20-10-0"),
            Some(&"main-sha".to_string())
        );
        assert_eq!(
            *harness.git.pushes.lock().unwrap(),
            vec!["devbox/nodejs-20-10-0".to_string()]
        );

        // Commit and PR
        let commits = harness.git.commits.lock().unwrap();
        assert_eq!(commits[0].1, "chore: update nodejs from 18.0.0 to 20.10.0");
        let pulls = harness.forge.pulls.lock().unwrap();
        assert_eq!(pulls.len(), 1);
        assert_eq!(pulls[0].title, "chore: update nodejs from 18.0.0 to 20.10.0");
        assert_eq!(pulls[0].head.ref_name, "devbox/nodejs-20-10-0");
    }

    #[tokio::test]
    async fn test_repeated_run_reuses_pr() {
        let harness = Harness::new(r#"{"packages":["nodejs@18.0.0"]}"#);
        let registry = || StaticRegistry::new(&[("nodejs", "20.10.0")]);

        let first = harness
            .orchestrator(registry(), FakeDevbox { fail: false }, &[])
            .run()
            .await;
        assert!(first.is_success());

        // Reset the manifest as if a new commit landed on main
        fs::write(
            harness.dir.path().join("devbox.json"),
            r#"{"packages":["nodejs@18.0.0"]}"#,
        )
        .unwrap();

        let second = harness
            .orchestrator(registry(), FakeDevbox { fail: false }, &[])
            .run()
            .await;
        assert!(second.is_success(), "{:?}", second.error);
        assert!(second.outputs.existing_pr_found);
        assert!(second.outputs.pr_updated);
        assert_eq!(harness.forge.pulls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scheduled_runs_keep_single_update_listing() {
        let stale = r#"{"packages":["nodejs@18.0.0"]}"#;
        let harness = Harness::new(stale);

        for _ in 0..3 {
            fs::write(harness.dir.path().join("devbox.json"), stale).unwrap();
            let report = harness
                .orchestrator(
                    StaticRegistry::new(&[("nodejs", "20.10.0")]),
                    FakeDevbox { fail: false },
                    &[],
                )
                .run()
                .await;
            assert!(report.is_success(), "{:?}", report.error);
        }

        let pulls = harness.forge.pulls.lock().unwrap();
        assert_eq!(pulls.len(), 1);
        let body = pulls[0].body.as_deref().unwrap();
        assert_eq!(body.matches("- **nodejs**: `18.0.0` → `20.10.0`").count(), 1);
        assert_eq!(body.matches("## Additional Updates").count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_package_is_skipped() {
        let harness = Harness::new(r#"{"packages":["nodejs@18.0.0","not-a-package@1.0.0"]}"#);
        let report = harness
            .orchestrator(
                StaticRegistry::new(&[("nodejs", "20.10.0")]),
                FakeDevbox { fail: false },
                &[],
            )
            .run()
            .await;

        assert!(report.is_success(), "{:?}", report.error);
        let manifest: serde_json::Value = serde_json::from_str(&harness.manifest()).unwrap();
        assert_eq!(manifest["packages"][1], "not-a-package@1.0.0");
    }

    #[tokio::test]
    async fn test_latest_pins_need_opt_in() {
        let harness = Harness::new(r#"{"packages":["go@latest"]}"#);
        let report = harness
            .orchestrator(
                StaticRegistry::new(&[("go", "1.22.0")]),
                FakeDevbox { fail: false },
                &[],
            )
            .run()
            .await;
        assert!(report.is_success());
        assert!(!report.outputs.changes);

        let report = harness
            .orchestrator(
                StaticRegistry::new(&[("go", "1.22.0")]),
                FakeDevbox { fail: false },
                &["--update-latest"],
            )
            .run()
            .await;
        assert!(report.is_success(), "{:?}", report.error);
        assert!(report.outputs.changes);
        assert!(harness.manifest().contains("go@latest"));
        assert!(harness.dir.path().join("devbox.lock").exists());
    }
}

mod manifest_preservation {
    use super::*;

    #[tokio::test]
    async fn test_other_sections_kept() {
        let harness = Harness::new(
            r#"{
  "$schema": "https://raw.githubusercontent.com/jetify-com/devbox/main/.schema/devbox.schema.json",
  "packages": ["jq@1.7.0", "ripgrep"],
  "shell": {
    "init_hook": ["echo hello"],
    "scripts": {"test": "cargo test", "lint": ["cargo fmt", "cargo clippy"]}
  },
  "nixpkgs": {"commit": "f80ac848e3d6f0c12c52758c0f25c10c97ca3b62"}
}"#,
        );
        let report = harness
            .orchestrator(
                StaticRegistry::new(&[("jq", "1.7.1"), ("ripgrep", "14.1.0")]),
                FakeDevbox { fail: false },
                &[],
            )
            .run()
            .await;
        assert!(report.is_success(), "{:?}", report.error);

        let manifest: serde_json::Value = serde_json::from_str(&harness.manifest()).unwrap();
        assert_eq!(manifest["packages"][0], "jq@1.7.1");
        assert_eq!(manifest["packages"][1], "ripgrep@14.1.0");
        assert_eq!(manifest["shell"]["scripts"]["lint"][1], "cargo clippy");
        assert_eq!(
            manifest["nixpkgs"]["commit"],
            "f80ac848e3d6f0c12c52758c0f25c10c97ca3b62"
        );

        // Key order is preserved
        let text = harness.manifest();
        assert!(text.find("$schema").unwrap() < text.find("packages").unwrap());
        assert!(text.find("shell").unwrap() < text.find("nixpkgs").unwrap());
    }

    #[tokio::test]
    async fn test_failed_lock_regeneration_restores_manifest() {
        let original = r#"{"packages":["nodejs@18.0.0"]}"#;
        let harness = Harness::new(original);
        let report = harness
            .orchestrator(
                StaticRegistry::new(&[("nodejs", "20.10.0")]),
                FakeDevbox { fail: true },
                &[],
            )
            .run()
            .await;

        assert!(!report.is_success());
        let info = report.error.unwrap();
        assert_eq!(info.code, "EXTERNAL_COMMAND_ERROR");
        assert_eq!(harness.manifest(), original);
        assert!(harness.git.commits.lock().unwrap().is_empty());
        assert!(harness.forge.pulls.lock().unwrap().is_empty());

        // No backup files left behind
        let leftovers: Vec<_> = fs::read_dir(harness.dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".backup."))
            .collect();
        assert!(leftovers.is_empty());
    }
}
