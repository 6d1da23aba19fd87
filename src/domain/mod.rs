//! Domain types for Devbox package updates
//!
//! This module provides:
//! - Version parsing and ordering
//! - Package spec parsing (`name[@version]`)
//! - Update candidates and the per-run update summary

mod package_spec;
mod summary;
mod update;
mod version;

pub use package_spec::{build_spec, parse_spec, ParsedPackage};
pub use summary::{UpdateSummary, UP_TO_DATE_MESSAGE};
pub use update::UpdateCandidate;
pub use version::{compare_versions, find_latest_version, parse_version, ParsedVersion, UpdateType};

/// Version pin that tracks whatever the registry resolves
pub const LATEST_VERSION: &str = "latest";

/// Reported current version when the manifest entry has no pin
pub const UNKNOWN_VERSION: &str = "unknown";

/// Reported latest version when the registry lookup did not complete
pub const LOOKUP_FAILED: &str = "lookup-failed";
