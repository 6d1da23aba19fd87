//! Update branch naming and matching

use crate::domain::{UpdateCandidate, LATEST_VERSION};
use chrono::{DateTime, NaiveDate, Utc};

/// Branch used whenever more than one package is updated
pub const MULTI_PACKAGE_BRANCH: &str = "multi-package-updates";

/// Lowercase and replace everything outside `[a-z0-9-]` with `-`
pub fn sanitize(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Deterministic branch name for an update set. Never fails.
///
/// A single update maps to `prefix/name-version`; an unresolved `latest`
/// target gets `today` appended so separate runs do not collide. Any other
/// number of updates shares `prefix/multi-package-updates`.
pub fn generate_branch_name(prefix: &str, updates: &[UpdateCandidate], today: NaiveDate) -> String {
    match updates {
        [single] => {
            let version = if single.latest_version == LATEST_VERSION {
                format!("{}-{}", LATEST_VERSION, today.format("%Y%m%d"))
            } else {
                single.latest_version.clone()
            };
            format!(
                "{}/{}-{}",
                prefix,
                sanitize(&single.package_name),
                sanitize(&version)
            )
        }
        _ => format!("{}/{}", prefix, MULTI_PACKAGE_BRANCH),
    }
}

/// Unique variant of `branch` used after losing a creation race
pub fn fallback_branch_name(branch: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}", branch, now.timestamp_millis())
}

/// Whether `branch` was created by this tool under `prefix`.
/// Both `prefix/...` and the older `prefix-...` layouts count.
pub fn is_update_branch(prefix: &str, branch: &str) -> bool {
    branch
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('-'))
}

/// Whether a PR title looks like a Devbox update
pub fn is_update_title(title: &str) -> bool {
    let title = title.to_lowercase();
    title.contains("devbox") && title.contains("update")
}
