//! Action outputs
//!
//! This module provides:
//! - The `ActionOutputs` set reported at the end of every run
//! - GitHub output-file rendering and workflow commands (see `github`)

mod github;

pub use github::{error_command, escape_command_value, render_outputs, write_outputs};

use serde::Serialize;
use serde_json::Value;

/// Outputs reported by a run, including failed runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ActionOutputs {
    /// Whether any package update was found
    pub changes: bool,
    pub update_summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    /// Whether an existing PR was updated
    pub pr_updated: bool,
    pub existing_pr_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ActionOutputs {
    /// Output name/value pairs in declaration order; unset optional outputs are left out
    pub fn entries(&self) -> Vec<(String, String)> {
        let Ok(Value::Object(map)) = serde_json::to_value(self) else {
            return Vec::new();
        };
        map.into_iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (name, value)
            })
            .collect()
    }
}
