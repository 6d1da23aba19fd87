//! Applying accepted updates to devbox.json
//!
//! This module provides:
//! - Partitioning of update candidates into pin changes and `latest` refreshes
//! - Manifest backup before mutation and best-effort restore on failure
//! - Lock regeneration through the devbox CLI and lock validation
//! - Commit message generation and the final commit
//!
//! The steps are not transactional. A failure after the backup is taken
//! restores the snapshot and then propagates the original error.

use crate::domain::UpdateCandidate;
use crate::error::{AppError, CommandError, FileSystemError, ValidationError};
use crate::manifest::{DevboxManifest, LOCK_FILENAME};
use crate::package_manager::LockRegenerator;
use crate::vcs::{CommitOutcome, Vcs};
use chrono::Utc;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Candidates sorted by what applying them involves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    /// Entries whose pin is rewritten
    pub pin_changes: Vec<UpdateCandidate>,
    /// `latest` entries that only need a lock refresh
    pub latest_refreshes: Vec<UpdateCandidate>,
    /// Registry lookups that failed
    pub lookup_failures: Vec<UpdateCandidate>,
    /// Entries already at the newest version
    pub already_current: Vec<UpdateCandidate>,
}

impl UpdatePlan {
    /// Partition candidates, logging everything that is skipped
    pub fn partition(candidates: &[UpdateCandidate]) -> Self {
        let mut plan = UpdatePlan::default();

        for candidate in candidates {
            if candidate.is_lookup_failure() {
                warn!(
                    package = %candidate.package_name,
                    "Skipping package whose registry lookup failed"
                );
                plan.lookup_failures.push(candidate.clone());
            } else if !candidate.update_available {
                info!(
                    package = %candidate.package_name,
                    version = %candidate.current_version,
                    "Package is already current"
                );
                plan.already_current.push(candidate.clone());
            } else if candidate.is_latest_refresh() {
                plan.latest_refreshes.push(candidate.clone());
            } else {
                plan.pin_changes.push(candidate.clone());
            }
        }

        plan
    }

    /// Every candidate that will be applied, pin changes first
    pub fn applicable(&self) -> Vec<&UpdateCandidate> {
        self.pin_changes
            .iter()
            .chain(self.latest_refreshes.iter())
            .collect()
    }

    /// Returns true if nothing can be applied
    pub fn is_empty(&self) -> bool {
        self.pin_changes.is_empty() && self.latest_refreshes.is_empty()
    }

    /// Number of candidates that will not be applied
    pub fn skipped(&self) -> usize {
        self.lookup_failures.len() + self.already_current.len()
    }
}

/// Outcome of applying updates
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// Manifest document after the update
    pub manifest: Value,
    /// Candidates that were applied
    pub applied: Vec<UpdateCandidate>,
    /// Number of manifest entries rewritten
    pub entries_rewritten: usize,
    /// Whether the manifest file was rewritten
    pub manifest_modified: bool,
    /// Commit message used
    pub commit_message: String,
    pub commit: CommitOutcome,
}

impl WriteResult {
    /// Returns true if a commit was created
    pub fn has_commit(&self) -> bool {
        self.commit == CommitOutcome::Committed
    }
}

/// Build the commit message for a set of applied updates
pub fn commit_message(updates: &[&UpdateCandidate]) -> String {
    match updates {
        [single] => format!(
            "chore: update {} from {} to {}",
            single.package_name, single.current_version, single.latest_version
        ),
        few if few.len() <= 3 => {
            let names: Vec<&str> = few.iter().map(|u| u.package_name.as_str()).collect();
            format!("chore: update {}", names.join(", "))
        }
        many => format!("chore: update {} packages", many.len()),
    }
}

struct Backup {
    manifest: PathBuf,
    /// `None` when no lock file existed before the run
    lock: Option<PathBuf>,
}

/// Writer that applies update candidates to a manifest on disk
pub struct ManifestWriter {
    manifest_path: PathBuf,
    lock_path: PathBuf,
    regenerator: Arc<dyn LockRegenerator>,
    vcs: Arc<dyn Vcs>,
}

impl ManifestWriter {
    /// Create a writer for `manifest_path`; the lock file lives next to it
    pub fn new(
        manifest_path: impl Into<PathBuf>,
        regenerator: Arc<dyn LockRegenerator>,
        vcs: Arc<dyn Vcs>,
    ) -> Self {
        let manifest_path = manifest_path.into();
        let lock_path = working_dir(&manifest_path).join(LOCK_FILENAME);
        Self {
            manifest_path,
            lock_path,
            regenerator,
            vcs,
        }
    }

    /// Path of the manifest this writer mutates
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Path of the lock file next to the manifest
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Apply every applicable candidate, regenerate the lock and commit.
    ///
    /// Fails with `ValidationError::NoValidUpdates` before touching any file
    /// when no candidate is applicable.
    pub async fn apply_updates(
        &self,
        candidates: &[UpdateCandidate],
    ) -> Result<WriteResult, AppError> {
        let plan = UpdatePlan::partition(candidates);
        if plan.is_empty() {
            return Err(ValidationError::NoValidUpdates {
                skipped: plan.skipped(),
            }
            .into());
        }

        let mut manifest = DevboxManifest::load(&self.manifest_path)?;
        let backup = self.create_backup()?;

        match self.mutate(&mut manifest, &plan).await {
            Ok(result) => {
                self.discard_backup(&backup);
                Ok(result)
            }
            Err(err) => {
                self.restore_backup(&backup);
                Err(err)
            }
        }
    }

    async fn mutate(
        &self,
        manifest: &mut DevboxManifest,
        plan: &UpdatePlan,
    ) -> Result<WriteResult, AppError> {
        let mut entries_rewritten = 0;
        for update in &plan.pin_changes {
            let rewritten = manifest.set_package_version(&update.package_name, &update.latest_version);
            if rewritten == 0 {
                warn!(package = %update.package_name, "Package entry not found in manifest");
            }
            entries_rewritten += rewritten;
        }

        let manifest_modified = entries_rewritten > 0;
        if manifest_modified {
            manifest.save()?;
            info!(entries = entries_rewritten, "Updated manifest pins");
        }

        for update in &plan.latest_refreshes {
            info!(
                package = %update.package_name,
                resolved = %update.latest_version,
                "Refreshing latest pin through the lock file"
            );
        }

        self.regenerate_lock().await?;

        let applicable = plan.applicable();
        let message = commit_message(&applicable);
        let commit = self
            .vcs
            .commit(
                &[self.manifest_path.clone(), self.lock_path.clone()],
                &message,
            )
            .await?;

        Ok(WriteResult {
            manifest: manifest.document().clone(),
            applied: applicable.into_iter().cloned().collect(),
            entries_rewritten,
            manifest_modified,
            commit_message: message,
            commit,
        })
    }

    /// Remove the stale lock, run the regenerator and check the result parses
    async fn regenerate_lock(&self) -> Result<(), AppError> {
        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path).map_err(|source| FileSystemError::Remove {
                path: self.lock_path.clone(),
                source,
            })?;
        }

        self.regenerator
            .regenerate(working_dir(&self.manifest_path))
            .await?;

        if !self.lock_path.exists() {
            return Err(CommandError::LockNotGenerated {
                path: self.lock_path.clone(),
            }
            .into());
        }

        let content = fs::read_to_string(&self.lock_path)
            .map_err(|e| FileSystemError::read(&self.lock_path, e))?;
        serde_json::from_str::<Value>(&content).map_err(|e| ValidationError::InvalidLockFile {
            path: self.lock_path.clone(),
            message: e.to_string(),
        })?;

        Ok(())
    }

    fn create_backup(&self) -> Result<Backup, FileSystemError> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f").to_string();
        let manifest = backup_path(&self.manifest_path, &stamp);
        fs::copy(&self.manifest_path, &manifest).map_err(|source| FileSystemError::Backup {
            path: self.manifest_path.clone(),
            backup: manifest.clone(),
            source,
        })?;

        let lock = if self.lock_path.exists() {
            let lock_backup = backup_path(&self.lock_path, &stamp);
            fs::copy(&self.lock_path, &lock_backup).map_err(|source| FileSystemError::Backup {
                path: self.lock_path.clone(),
                backup: lock_backup.clone(),
                source,
            })?;
            Some(lock_backup)
        } else {
            None
        };

        info!(backup = %manifest.display(), "Backed up manifest");
        Ok(Backup { manifest, lock })
    }

    /// Best effort; a failed restore is logged and never replaces the original error
    fn restore_backup(&self, backup: &Backup) {
        let mut targets = vec![(&backup.manifest, &self.manifest_path)];
        match &backup.lock {
            Some(lock) => targets.push((lock, &self.lock_path)),
            None if self.lock_path.exists() => match fs::remove_file(&self.lock_path) {
                Ok(()) => info!(path = %self.lock_path.display(), "Removed lock file created by this run"),
                Err(source) => {
                    let err = FileSystemError::Remove {
                        path: self.lock_path.clone(),
                        source,
                    };
                    error!("{}", err);
                }
            },
            None => {}
        }

        for (from, to) in targets {
            match fs::copy(from, to) {
                Ok(_) => {
                    info!(path = %to.display(), "Restored from backup");
                    let _ = fs::remove_file(from);
                }
                Err(source) => {
                    let err = FileSystemError::Restore {
                        path: to.clone(),
                        backup: from.clone(),
                        source,
                    };
                    error!("{}", err);
                }
            }
        }
    }

    fn discard_backup(&self, backup: &Backup) {
        let mut paths = vec![&backup.manifest];
        paths.extend(backup.lock.as_ref());
        for path in paths {
            if let Err(source) = fs::remove_file(path) {
                let err = FileSystemError::Remove {
                    path: path.clone(),
                    source,
                };
                warn!("{}", err);
            }
        }
    }
}

fn working_dir(manifest_path: &Path) -> &Path {
    match manifest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn backup_path(path: &Path, stamp: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".backup.{}", stamp));
    path.with_file_name(name)
}
