//! Update candidate type

use super::{UpdateType, LATEST_VERSION, LOOKUP_FAILED, UNKNOWN_VERSION};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A package paired with its current and latest known versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCandidate {
    pub package_name: String,
    /// Pinned version from the manifest, or `unknown`
    pub current_version: String,
    /// Version resolved by the registry, or `lookup-failed`
    pub latest_version: String,
    pub update_available: bool,
}

impl UpdateCandidate {
    /// Creates a new UpdateCandidate
    pub fn new(
        package_name: impl Into<String>,
        current_version: impl Into<String>,
        latest_version: impl Into<String>,
        update_available: bool,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            current_version: current_version.into(),
            latest_version: latest_version.into(),
            update_available,
        }
    }

    /// Creates a candidate for a package whose registry lookup failed.
    /// Such a candidate is never applicable.
    pub fn lookup_failed(package_name: impl Into<String>, current_version: Option<&str>) -> Self {
        Self::new(
            package_name,
            current_version.unwrap_or(UNKNOWN_VERSION),
            LOOKUP_FAILED,
            false,
        )
    }

    /// Returns true if the registry lookup for this package failed
    pub fn is_lookup_failure(&self) -> bool {
        self.latest_version == LOOKUP_FAILED
    }

    /// Returns true if the manifest pins this package to `latest`
    pub fn is_latest_refresh(&self) -> bool {
        self.current_version == LATEST_VERSION
    }

    /// Size of the version step this candidate represents
    pub fn update_type(&self) -> UpdateType {
        UpdateType::between(&self.current_version, &self.latest_version)
    }
}

impl fmt::Display for UpdateCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} → {}",
            self.package_name, self.current_version, self.latest_version
        )
    }
}
