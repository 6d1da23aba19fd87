//! devbox.json loading, validation and rewriting
//!
//! This module provides functionality to:
//! - Load and schema-check a Devbox manifest
//! - Read its package list as parsed specs
//! - Rewrite package pins in the original text, keeping its formatting
//! - Apply a set of updates end to end (see `ManifestWriter`)

mod validation;
mod writer;

pub use validation::validate_manifest;
pub use writer::{commit_message, ManifestWriter, UpdatePlan, WriteResult};

use crate::domain::{build_spec, parse_spec, ParsedPackage, LATEST_VERSION};
use crate::error::{AppError, FileSystemError, ValidationError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static PACKAGES_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""packages"\s*:\s*\["#).unwrap());

/// Default manifest file name
pub const MANIFEST_FILENAME: &str = "devbox.json";

/// Lock file produced by `devbox install`
pub const LOCK_FILENAME: &str = "devbox.lock";

/// Typed view of the sections this tool understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevboxConfig {
    pub packages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<ShellConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nixpkgs: Option<NixpkgsConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_hook: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts: Option<BTreeMap<String, Script>>,
}

/// A shell script: one command or a list of commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Script {
    Command(String),
    Steps(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NixpkgsConfig {
    pub commit: String,
}

/// A validated devbox.json document
#[derive(Debug, Clone)]
pub struct DevboxManifest {
    path: PathBuf,
    /// Full document, including sections not modelled by `DevboxConfig`
    document: Value,
    config: DevboxConfig,
    /// Original text with pin edits applied; `None` once an edit could not
    /// be located in the text
    source: Option<String>,
}

impl DevboxManifest {
    /// Load and validate a manifest from disk
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Err(ValidationError::ManifestNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let content = fs::read_to_string(path).map_err(|e| FileSystemError::read(path, e))?;
        Ok(Self::parse(path, &content)?)
    }

    /// Parse and validate manifest content
    pub fn parse(path: &Path, content: &str) -> Result<Self, ValidationError> {
        let document: Value = serde_json::from_str(content)
            .map_err(|e| ValidationError::invalid_json(path, e.to_string()))?;

        let problems = validate_manifest(&document);
        if !problems.is_empty() {
            return Err(ValidationError::invalid_manifest(path, problems));
        }

        let config: DevboxConfig = serde_json::from_value(document.clone())
            .map_err(|e| ValidationError::invalid_manifest(path, vec![e.to_string()]))?;

        Ok(Self {
            path: path.to_path_buf(),
            document,
            config,
            source: Some(content.to_string()),
        })
    }

    /// Path this manifest was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Typed manifest sections
    pub fn config(&self) -> &DevboxConfig {
        &self.config
    }

    /// Raw package entries in manifest order
    pub fn packages(&self) -> &[String] {
        &self.config.packages
    }

    /// Package entries split into name and version
    pub fn parsed_packages(&self) -> Vec<ParsedPackage> {
        self.config.packages.iter().map(|p| parse_spec(p)).collect()
    }

    /// Full JSON document
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Pin every entry for `name` to `version`, leaving `latest` pins alone.
    /// Returns the number of entries rewritten.
    pub fn set_package_version(&mut self, name: &str, version: &str) -> usize {
        let new_spec = build_spec(name, Some(version));
        let mut rewritten = 0;

        let entries = self
            .document
            .get_mut("packages")
            .and_then(Value::as_array_mut);
        if let Some(entries) = entries {
            for (index, entry) in entries.iter_mut().enumerate() {
                let Some(spec) = entry.as_str() else { continue };
                let parsed = parse_spec(spec);
                if parsed.name != name || parsed.version.as_deref() == Some(LATEST_VERSION) {
                    continue;
                }
                let old_spec = spec.to_string();
                self.source = self
                    .source
                    .take()
                    .and_then(|text| replace_package_literal(&text, &old_spec, &new_spec));
                *entry = Value::String(new_spec.clone());
                if let Some(typed) = self.config.packages.get_mut(index) {
                    *typed = new_spec.clone();
                }
                rewritten += 1;
            }
        }

        rewritten
    }

    /// Render the document. Pin edits are applied to the original text so
    /// unrelated lines keep their formatting; if that text no longer parses
    /// to the edited document, it is pretty-printed the way devbox writes it.
    pub fn to_json_string(&self) -> String {
        if let Some(source) = &self.source {
            let matches = serde_json::from_str::<Value>(source).is_ok_and(|v| v == self.document);
            if matches {
                return source.clone();
            }
        }

        // Serializing a Value cannot fail
        let mut out = serde_json::to_string_pretty(&self.document).unwrap_or_default();
        out.push('\n');
        out
    }

    /// Persist the document to its path
    pub fn save(&self) -> Result<(), FileSystemError> {
        fs::write(&self.path, self.to_json_string())
            .map_err(|e| FileSystemError::write(&self.path, e))
    }
}

/// Byte range of the top-level `packages` array contents
fn packages_span(content: &str) -> Option<Range<usize>> {
    let start = PACKAGES_START_RE.find(content)?.end();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in content[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == ']' {
            return Some(start..start + offset);
        }
    }
    None
}

/// Swap the string literal `old` for `new` inside the packages array
fn replace_package_literal(content: &str, old: &str, new: &str) -> Option<String> {
    let span = packages_span(content)?;
    let old_literal = serde_json::to_string(old).ok()?;
    let new_literal = serde_json::to_string(new).ok()?;

    let section = &content[span.clone()];
    if !section.contains(&old_literal) {
        return None;
    }
    Some(format!(
        "{}{}{}",
        &content[..span.start],
        section.replace(&old_literal, &new_literal),
        &content[span.end..]
    ))
}
