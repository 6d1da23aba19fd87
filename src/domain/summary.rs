//! Update summary for a single scan
//!
//! Built once per scan from the candidates that have an update available,
//! then handed unchanged to the manifest writer and the PR reconciler.

use super::UpdateCandidate;
use serde::{Deserialize, Serialize};

/// Message used when no package needs an update
pub const UP_TO_DATE_MESSAGE: &str = "All Devbox packages are up to date.";

/// Overall summary of a package scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSummary {
    /// Candidates with an update available, in manifest order
    updates: Vec<UpdateCandidate>,
    /// Packages whose registry lookup failed
    lookup_failures: Vec<String>,
    /// Number of packages that were checked
    packages_checked: usize,
    /// Human readable rendering of the updates
    summary: String,
}

impl UpdateSummary {
    /// Build a summary from every candidate produced by a scan
    pub fn from_candidates(candidates: Vec<UpdateCandidate>) -> Self {
        let packages_checked = candidates.len();
        let lookup_failures = candidates
            .iter()
            .filter(|c| c.is_lookup_failure())
            .map(|c| c.package_name.clone())
            .collect();
        let updates: Vec<UpdateCandidate> = candidates
            .into_iter()
            .filter(|c| c.update_available)
            .collect();
        let summary = render(&updates);

        Self {
            updates,
            lookup_failures,
            packages_checked,
            summary,
        }
    }

    /// Candidates with an update available
    pub fn updates(&self) -> &[UpdateCandidate] {
        &self.updates
    }

    /// Names of packages whose lookup failed
    pub fn lookup_failures(&self) -> &[String] {
        &self.lookup_failures
    }

    /// Number of packages that were checked
    pub fn packages_checked(&self) -> usize {
        self.packages_checked
    }

    /// Returns the total number of available updates
    pub fn total_updates(&self) -> usize {
        self.updates.len()
    }

    /// Returns true if at least one update is available
    pub fn has_changes(&self) -> bool {
        self.total_updates() > 0
    }

    /// Rendered human summary
    pub fn summary(&self) -> &str {
        &self.summary
    }
}

fn render(updates: &[UpdateCandidate]) -> String {
    if updates.is_empty() {
        return UP_TO_DATE_MESSAGE.to_string();
    }

    let mut out = format!("Found {} package update(s):\n", updates.len());
    for update in updates {
        out.push_str(&format!("- {}\n", update));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<UpdateCandidate> {
        vec![
            UpdateCandidate::new("nodejs", "18.0.0", "20.10.0", true),
            UpdateCandidate::new("python", "3.12.0", "3.12.0", false),
            UpdateCandidate::lookup_failed("mystery", Some("1.0")),
            UpdateCandidate::new("go", "latest", "1.22.0", true),
        ]
    }

    #[test]
    fn test_from_candidates_filters_updates() {
        let summary = UpdateSummary::from_candidates(candidates());
        assert_eq!(summary.total_updates(), 2);
        assert!(summary.has_changes());
        assert_eq!(summary.packages_checked(), 4);
        assert_eq!(summary.lookup_failures(), &["mystery".to_string()]);
        assert_eq!(summary.updates()[0].package_name, "nodejs");
        assert_eq!(summary.updates()[1].package_name, "go");
    }

    #[test]
    fn test_summary_text() {
        let summary = UpdateSummary::from_candidates(candidates());
        assert_eq!(
            summary.summary(),
            "Found 2 package update(s):\n- nodejs: 18.0.0 → 20.10.0\n- go: latest → 1.22.0"
        );
    }

    #[test]
    fn test_empty_summary() {
        let summary = UpdateSummary::from_candidates(vec![UpdateCandidate::new(
            "python", "3.12.0", "3.12.0", false,
        )]);
        assert!(!summary.has_changes());
        assert_eq!(summary.total_updates(), 0);
        assert_eq!(summary.summary(), UP_TO_DATE_MESSAGE);
    }
}
