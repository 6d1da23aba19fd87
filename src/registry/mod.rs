//! Registry access for fetching Devbox package versions
//!
//! This module provides:
//! - HTTP client shared foundation
//! - Devbox search API adapter
//! - `RegistryClient`, which layers retries and update detection on top
//!
//! `get_latest_version` and `get_package_info` are partial and may fail the
//! caller. `check_for_updates` and `check_multiple_packages_for_updates` are
//! total: lookup failures become `lookup-failed` candidates.

mod client;
mod nixhub;

pub use client::{HttpClient, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use nixhub::{NixhubApi, DEVBOX_SEARCH_URL};

use crate::domain::{
    compare_versions, ParsedPackage, UpdateCandidate, LATEST_VERSION, UNKNOWN_VERSION,
};
use crate::error::{AppError, ValidationError};
use crate::retry::RetryExecutor;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

/// Registry lookups in flight at once
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Response of the resolve endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPackage {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Response of the package info endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub homepage_url: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
}

/// Raw registry endpoints
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Resolve `name` at `version` (usually `latest`)
    async fn resolve(&self, name: &str, version: &str) -> Result<ResolvedPackage, AppError>;

    /// Fetch descriptive metadata for `name`
    async fn package_info(&self, name: &str) -> Result<PackageInfo, AppError>;
}

/// Registry client with retries and update detection
#[derive(Clone)]
pub struct RegistryClient {
    api: Arc<dyn RegistryApi>,
    retry: RetryExecutor,
    /// Whether `latest` pins count as updatable
    allow_latest_refresh: bool,
    concurrency: usize,
}

impl RegistryClient {
    /// Create a client over `api`
    pub fn new(api: Arc<dyn RegistryApi>, retry: RetryExecutor) -> Self {
        Self {
            api,
            retry,
            allow_latest_refresh: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Limit the number of lookups in flight (at least one)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Allow or forbid refreshing packages pinned to `latest`
    pub fn with_latest_refresh(mut self, allow: bool) -> Self {
        self.allow_latest_refresh = allow;
        self
    }

    /// Latest version of `name` according to the registry
    pub async fn get_latest_version(&self, name: &str) -> Result<String, AppError> {
        let label = format!("resolve {}", name);
        let resolved = self
            .retry
            .execute_network_request(&label, || self.api.resolve(name, LATEST_VERSION))
            .await?;

        match resolved.version {
            Some(version) if !version.trim().is_empty() => Ok(version),
            _ => Err(ValidationError::MissingVersionField {
                package: name.to_string(),
            }
            .into()),
        }
    }

    /// Descriptive metadata for `name`
    pub async fn get_package_info(&self, name: &str) -> Result<PackageInfo, AppError> {
        let label = format!("package info {}", name);
        self.retry
            .execute_network_request(&label, || self.api.package_info(name))
            .await
    }

    /// Build the update candidate for one package. Never fails.
    pub async fn check_for_updates(&self, package: &ParsedPackage) -> UpdateCandidate {
        let latest = match self.get_latest_version(&package.name).await {
            Ok(latest) => latest,
            Err(e) => {
                warn!(package = %package.name, error = %e, "Registry lookup failed");
                return UpdateCandidate::lookup_failed(&package.name, package.version.as_deref());
            }
        };

        if package.is_latest() {
            return UpdateCandidate::new(
                &package.name,
                LATEST_VERSION,
                latest,
                self.allow_latest_refresh,
            );
        }

        let current = package.version.as_deref().unwrap_or(UNKNOWN_VERSION);
        let update_available = match compare_versions(current, &latest) {
            Ok(ordering) => ordering == Ordering::Less,
            Err(e) => {
                warn!(package = %package.name, error = %e, "Cannot compare versions");
                false
            }
        };
        debug!(
            package = %package.name,
            current,
            latest = %latest,
            update_available,
            "Checked package"
        );

        UpdateCandidate::new(&package.name, current, latest, update_available)
    }

    /// Check every package with bounded concurrency; results follow input order
    pub async fn check_multiple_packages_for_updates(
        &self,
        packages: &[ParsedPackage],
    ) -> Vec<UpdateCandidate> {
        stream::iter(packages)
            .map(|p| self.check_for_updates(p))
            .buffered(self.concurrency)
            .collect()
            .await
    }
}
