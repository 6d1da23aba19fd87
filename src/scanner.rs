//! Scanning devbox.json for available updates

use crate::domain::UpdateSummary;
use crate::error::AppError;
use crate::manifest::DevboxManifest;
use crate::registry::RegistryClient;
use std::path::{Path, PathBuf};
use tracing::info;

/// Finds package updates for one manifest
pub struct UpdateScanner {
    manifest_path: PathBuf,
    registry: RegistryClient,
}

impl UpdateScanner {
    pub fn new(manifest_path: impl Into<PathBuf>, registry: RegistryClient) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            registry,
        }
    }

    /// Manifest being scanned
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Load the manifest, look every package up and summarize the updates.
    ///
    /// Fails only when the manifest cannot be loaded or validated; failed
    /// registry lookups are recorded in the summary instead.
    pub async fn generate_update_summary(&self) -> Result<UpdateSummary, AppError> {
        let manifest = DevboxManifest::load(&self.manifest_path)?;
        let packages = manifest.parsed_packages();
        info!(
            manifest = %self.manifest_path.display(),
            packages = packages.len(),
            "Checking packages for updates"
        );

        let candidates = self
            .registry
            .check_multiple_packages_for_updates(&packages)
            .await;
        let summary = UpdateSummary::from_candidates(candidates);

        info!(
            updates = summary.total_updates(),
            lookup_failures = summary.lookup_failures().len(),
            "Scan complete"
        );
        Ok(summary)
    }
}
