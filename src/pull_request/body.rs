//! Pull request title and body rendering

use crate::domain::{UpdateCandidate, UpdateType};
use chrono::NaiveDate;
use std::fmt::Write;

/// Title for an update set
pub fn pr_title(updates: &[UpdateCandidate]) -> String {
    match updates {
        [single] => format!(
            "chore: update {} from {} to {}",
            single.package_name, single.current_version, single.latest_version
        ),
        many => format!("chore: update {} Devbox packages", many.len()),
    }
}

fn update_line(update: &UpdateCandidate) -> String {
    format!(
        "- **{}**: `{}` → `{}`",
        update.package_name, update.current_version, update.latest_version
    )
}

/// Updates grouped by the size of their version step, empty groups omitted
pub fn grouped_sections(updates: &[UpdateCandidate]) -> String {
    let mut out = String::new();
    for kind in UpdateType::all() {
        let lines: Vec<String> = updates
            .iter()
            .filter(|u| u.update_type() == *kind)
            .map(update_line)
            .collect();
        if lines.is_empty() {
            continue;
        }
        let _ = writeln!(out, "### {}\n", kind.heading());
        for line in lines {
            let _ = writeln!(out, "{}", line);
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Full body for a new or overwritten pull request
pub fn render_body(heading: &str, updates: &[UpdateCandidate]) -> String {
    format!(
        "## {}\n\nThis PR updates {} Devbox package(s) and regenerates `devbox.lock`.\n\n{}\n\n---\n_Generated by devbox-updater_\n",
        heading,
        updates.len(),
        grouped_sections(updates)
    )
}

/// Existing body with an extra section for the updates it does not list yet.
/// Returns the body unchanged when every update is already present.
pub fn merge_body(existing: &str, updates: &[UpdateCandidate], today: NaiveDate) -> String {
    let missing: Vec<UpdateCandidate> = updates
        .iter()
        .filter(|u| !existing.contains(&update_line(u)))
        .cloned()
        .collect();
    if missing.is_empty() {
        return existing.to_string();
    }

    format!(
        "{}\n\n## Additional Updates ({})\n\n{}\n",
        existing.trim_end(),
        today.format("%Y-%m-%d"),
        grouped_sections(&missing)
    )
}
